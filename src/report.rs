//! Pluggable reporting of scheduling events.
//!
//! Mirrors the role `foundry_compilers::report` plays for `solc` invocations:
//! the core never decides *how* to present progress, it only calls out to
//! whatever [`Reporter`] is currently installed. The default is a silent
//! no-op; [`TracingReporter`] forwards every event to `tracing` so a binary
//! that just initializes a subscriber gets sensible output for free.

use crate::ids::ProjectId;
use crate::result::CompileResult;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

/// Observes scheduling events as the DAG walker advances nodes through their
/// lifecycle. Implementations must be cheap: these callbacks are invoked
/// from inside the scheduling hot path.
pub trait Reporter: Send + Sync {
    /// A node's compile operation has been scheduled (invoked or forked).
    fn on_schedule(&self, _project: &ProjectId) {}

    /// A node's pickle promise reached a terminal state.
    fn on_pickle_ready(&self, _project: &ProjectId, _uri: Option<&crate::ids::PickleUri>) {}

    /// A node's Java compilation finished (successfully or not).
    fn on_java_complete(&self, _project: &ProjectId, _ok: bool) {}

    /// A node was synthesised as blocked instead of being compiled.
    fn on_blocked(&self, _project: &ProjectId, _blocking: &[ProjectId]) {}

    /// Pipelining was requested but the compiler chose not to use it.
    fn on_pipelining_not_used(&self, _project: &ProjectId) {}

    /// A node's full compilation finished.
    fn on_finished(&self, _project: &ProjectId, _result: &CompileResult) {}
}

/// Silent default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Forwards every event to `tracing` at a level appropriate to its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_schedule(&self, project: &ProjectId) {
        debug!(%project, "scheduling compile");
    }

    fn on_pickle_ready(&self, project: &ProjectId, uri: Option<&crate::ids::PickleUri>) {
        match uri {
            Some(uri) => debug!(%project, %uri, "pickle ready"),
            None => debug!(%project, "pickle phase completed without producing a pickle"),
        }
    }

    fn on_java_complete(&self, project: &ProjectId, ok: bool) {
        debug!(%project, ok, "java compilation complete");
    }

    fn on_blocked(&self, project: &ProjectId, blocking: &[ProjectId]) {
        let names: Vec<&str> = blocking.iter().map(ProjectId::as_str).collect();
        warn!(%project, blocked_by = ?names, "project blocked");
    }

    fn on_pipelining_not_used(&self, project: &ProjectId) {
        warn!(%project, "didn't use pipelined compilation");
    }

    fn on_finished(&self, project: &ProjectId, result: &CompileResult) {
        match result {
            CompileResult::Ok => debug!(%project, "compilation finished"),
            CompileResult::NotOk(cause) => error!(%project, ?cause, "compilation failed"),
        }
    }
}

/// Initializes a default `tracing` subscriber (env-filtered, human-readable)
/// and installs [`TracingReporter`] as the current reporter. A convenience
/// for embedders that just want sensible output without building their own
/// subscriber; does nothing if a global subscriber is already installed.
pub fn init_default_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    set_reporter(Arc::new(TracingReporter));
}

static CURRENT: Lazy<RwLock<Arc<dyn Reporter>>> = Lazy::new(|| RwLock::new(Arc::new(NoopReporter)));

/// Installs a new global reporter, returning the previous one.
pub fn set_reporter(reporter: Arc<dyn Reporter>) -> Arc<dyn Reporter> {
    let mut slot = CURRENT.write().unwrap_or_else(|e| e.into_inner());
    std::mem::replace(&mut *slot, reporter)
}

/// Returns the currently installed reporter.
pub fn current() -> Arc<dyn Reporter> {
    CURRENT.read().unwrap_or_else(|e| e.into_inner()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reporter_restores_whatever_was_installed_before_it() {
        let marker = Arc::new(TracingReporter);
        let previous = set_reporter(marker.clone());
        let restored = set_reporter(previous);
        assert!(Arc::ptr_eq(&restored, &marker));
    }
}
