//! Final, terminal compile results — what a project's full compilation
//! settles to once both phases (pickle, then Java) have run or the node was
//! never compiled at all because it was blocked.

use crate::ids::ProjectId;
use std::sync::Arc;

/// Why a node did not reach `Ok`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailedCause {
    /// The injected `compile` operation itself reported failure.
    CompileFailed(Arc<str>),
    /// `setup` failed before `compile` was ever invoked.
    SetupFailed(Arc<str>),
    /// One or more dependencies never produced a usable pickle, so this
    /// node was synthesised as a failure without ever being compiled.
    Blocked(Vec<ProjectId>),
    /// A cancellation token fired before the node completed.
    Cancelled,
    /// The node's own forked task was dropped before completing its
    /// promises — a panic, most likely. Surfaced as a failure rather than
    /// silently treated as "no result" so a dependent never mistakes a
    /// crashed dependency for one that simply hasn't finished yet.
    PromiseDropped,
}

/// The terminal state of a single project's compilation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompileResult {
    Ok,
    NotOk(FailedCause),
}

impl CompileResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CompileResult::Ok)
    }

    pub fn blocked(by: Vec<ProjectId>) -> Self {
        CompileResult::NotOk(FailedCause::Blocked(by))
    }
}

/// A named final result, as produced by the [`crate::collector::ResultCollector`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FinalCompileResult {
    pub project: ProjectId,
    pub result: CompileResult,
}

/// The outcome of a node's early (pickle) phase, as observed by its
/// dependents: a ready artifact, a deliberate no-op, or a failure that
/// happened before one could be produced.
#[derive(Debug, Clone)]
pub enum PickleOutcome {
    /// The pickle phase produced a usable artifact.
    Ready(crate::ids::PickleUri),
    /// The phase finished (or the node was never run) without producing
    /// one; dependents may still continue if they don't strictly require it.
    Unavailable,
    /// The node's compile failed before a pickle could be produced.
    Failed,
}
