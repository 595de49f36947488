//! Crate-wide error type.

use crate::ids::ProjectId;
use std::path::PathBuf;

/// Errors surfaced by the scheduling core itself.
///
/// Failures that originate in an injected collaborator (the compile
/// operation, the setup function) are never converted into this type — they
/// are represented as [`crate::partial::BlockingCause`] /
/// [`crate::result::CompileResult`] values and threaded through the
/// promise/partial-result machinery instead. This type is reserved for
/// programmer errors and pre-flight failures of the core (e.g. the
/// sequential pre-check).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path:?}: {source}")]
    Io { source: std::io::Error, path: PathBuf },

    #[error("malformed previous-results file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sequential pre-check failed: dependency '{0}' previously failed to compile")]
    SequentialDependencyFailed(ProjectId),

    #[error("promise for '{0}' was dropped without being completed")]
    PromiseDropped(ProjectId),

    #[error("{0}")]
    Msg(String),
}

impl Error {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io { source, path: path.into() }
    }

    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Msg(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
