//! The partial-result algebra.
//!
//! While a node's dependencies are still resolving, the walker needs a value
//! that can represent "nothing has gone wrong yet, but nothing has
//! succeeded yet either", as distinct from an actual success or an actual
//! failure, and that can accumulate more than one failure without picking a
//! winner. `PartialCompileResult` is that value; `blocking_project` is a
//! deliberately *shallow* predicate over it — it inspects only the
//! immediate roots of a partial result, never recurses into a dependency's
//! own dependencies, because those were already resolved (and, if blocked,
//! already folded into this node's own partial result) by the time this
//! node is evaluated.

use crate::ids::ProjectId;
use crate::result::FailedCause;
use std::sync::Arc;

/// The accumulator used while awaiting a project's dependencies.
#[derive(Debug, Clone)]
pub enum PartialCompileResult {
    /// No dependency has resolved yet, or there were no dependencies to
    /// begin with.
    Empty,
    /// Every dependency seen so far succeeded.
    Success,
    /// Exactly one dependency has failed so far.
    Failure(ProjectId, Arc<str>),
    /// More than one dependency has failed.
    Failures(Vec<(ProjectId, Arc<str>)>),
}

impl PartialCompileResult {
    /// Folds one more dependency's outcome into the accumulator. `Success`
    /// dependencies leave a `Failure`/`Failures` accumulator untouched;
    /// failures accumulate without replacing one another.
    pub fn combine(self, project: ProjectId, ok: bool, message: Arc<str>) -> Self {
        match (self, ok) {
            (PartialCompileResult::Empty, true) => PartialCompileResult::Success,
            (PartialCompileResult::Empty, false) => PartialCompileResult::Failure(project, message),
            (PartialCompileResult::Success, true) => PartialCompileResult::Success,
            (PartialCompileResult::Success, false) => PartialCompileResult::Failure(project, message),
            (PartialCompileResult::Failure(p, m), true) => PartialCompileResult::Failure(p, m),
            (PartialCompileResult::Failure(p, m), false) => {
                PartialCompileResult::Failures(vec![(p, m), (project, message)])
            }
            (PartialCompileResult::Failures(fs), true) => PartialCompileResult::Failures(fs),
            (PartialCompileResult::Failures(mut fs), false) => {
                fs.push((project, message));
                PartialCompileResult::Failures(fs)
            }
        }
    }

    /// Names of every dependency recorded as failed, in accumulation order.
    pub fn failed_names(&self) -> Vec<ProjectId> {
        match self {
            PartialCompileResult::Empty | PartialCompileResult::Success => Vec::new(),
            PartialCompileResult::Failure(p, _) => vec![p.clone()],
            PartialCompileResult::Failures(fs) => fs.iter().map(|(p, _)| p.clone()).collect(),
        }
    }
}

/// Names of the immediate dependencies that block a node from compiling, or
/// `None` if the node is free to proceed.
///
/// This is a *shallow* inspection: it looks only at `partial`'s own
/// `Failure`/`Failures` roots, never at a failed dependency's own upstream
/// causes — those are already summarised in `partial` by the time this node
/// evaluates it, so re-descending would just duplicate names already
/// collected one level down.
pub fn blocking_project(partial: &PartialCompileResult) -> Option<BlockingCause> {
    let names = partial.failed_names();
    if names.is_empty() {
        None
    } else {
        Some(BlockingCause { blocking: names })
    }
}

/// The set of dependency names that prevented a node from ever being
/// handed to `compile`.
#[derive(Debug, Clone)]
pub struct BlockingCause {
    pub blocking: Vec<ProjectId>,
}

impl From<BlockingCause> for FailedCause {
    fn from(cause: BlockingCause) -> Self {
        FailedCause::Blocked(cause.blocking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_successes_stay_success() {
        let partial = PartialCompileResult::Empty
            .combine("a".into(), true, "ok".into())
            .combine("b".into(), true, "ok".into());
        assert!(matches!(partial, PartialCompileResult::Success));
        assert!(blocking_project(&partial).is_none());
    }

    #[test]
    fn a_single_failure_blocks_with_its_own_name() {
        let partial = PartialCompileResult::Empty.combine("a".into(), false, "boom".into());
        let cause = blocking_project(&partial).expect("should block");
        assert_eq!(cause.blocking, vec!["a".into()]);
    }

    #[test]
    fn multiple_failures_accumulate_instead_of_picking_one() {
        let partial = PartialCompileResult::Empty
            .combine("a".into(), false, "boom".into())
            .combine("b".into(), true, "ok".into())
            .combine("c".into(), false, "bang".into());
        let cause = blocking_project(&partial).expect("should block");
        assert_eq!(cause.blocking, vec!["a".into(), "c".into()]);
    }
}
