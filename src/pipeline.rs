//! Assembly policies that turn a node's dependency [`NodeHandle`]s into
//! either a ready-to-compile bundle/picklepath or a reason the node cannot
//! proceed.
//!
//! Two policies are implemented:
//!
//! - [`assemble_normal`] waits for every dependency's *final* result before
//!   calling `setup`, so `setup` always sees a fully settled partial result
//!   and every pickle a successful dependency produced.
//! - [`assemble_pipelined`] waits only for dependencies' *pickle chains*,
//!   letting `setup`/`compile` start as soon as upstream early type
//!   information exists rather than waiting for a full compile.

use crate::bundle::{CompileBundle, EarlyResult, Project};
use crate::error::Error;
use crate::ids::{PickleUri, ProjectId};
use crate::javasignal::{aggregate_java_signals, JavaSignal};
use crate::partial::{blocking_project, BlockingCause, PartialCompileResult};
use crate::promise::PromiseError;
use crate::result::{CompileResult, FailedCause, FinalCompileResult};
use crate::walker::{NodeHandle, WalkContext};
use std::sync::Arc;

/// The result of running an assembly policy for one node.
pub enum Assembly {
    Ready { bundle: CompileBundle, picklepath: Vec<PickleUri> },
    Blocked(BlockingCause),
    SetupFailed(Arc<str>),
}

/// Waits for every dependency's final result, builds the accumulated
/// partial result, and — if nothing blocks this node — calls `setup` with
/// every pickle a successful dependency (transitively) produced.
pub async fn assemble_normal(ctx: &WalkContext, project: &Project, dependencies: &[NodeHandle]) -> Assembly {
    let finals = await_all_finished(dependencies).await;
    let partial = fold_partial(&finals);

    if let Some(cause) = blocking_project(&partial) {
        return Assembly::Blocked(cause);
    }

    let picklepath = await_pickle_chain(dependencies).await;
    run_setup(ctx, project, picklepath)
}

/// Waits only for dependencies' pickle chains, then checks blocking against
/// whatever Java signal each dependency has *already* settled to by that
/// point — a dependency that produced a pickle before failing its own Java
/// phase does not block this node's pipelined setup; its failure instead
/// reaches this node later through `transitive_java_signal`.
pub async fn assemble_pipelined(ctx: &WalkContext, project: &Project, dependencies: &[NodeHandle]) -> Assembly {
    let picklepath = await_pickle_chain(dependencies).await;

    let partial = fold_partial_from_ready_finals(dependencies).await;
    if let Some(cause) = blocking_project(&partial) {
        return Assembly::Blocked(cause);
    }

    run_setup(ctx, project, picklepath)
}

fn run_setup(ctx: &WalkContext, project: &Project, picklepath: Vec<PickleUri>) -> Assembly {
    match (ctx.setup)(project, &picklepath) {
        Ok(bundle) => Assembly::Ready { bundle, picklepath },
        Err(EarlyResult::SetupFailed { message, .. }) => Assembly::SetupFailed(message),
    }
}

/// The name to blame when a dependency's promise resolves to
/// [`PromiseError::WriterDropped`] — its own project name, or a synthetic
/// marker for an `Aggregate` node (which has none of its own).
fn dependency_name(dependency: &NodeHandle) -> ProjectId {
    dependency.project.as_ref().map(|p| p.name.clone()).unwrap_or_else(|| "<aggregate>".into())
}

/// Awaits every dependency's final result, in submission order (the results
/// themselves settle in whatever order the underlying tasks finish; this
/// just determines iteration order for folding, which doesn't matter since
/// [`PartialCompileResult::combine`] is associative). A dependency whose
/// task panicked before completing `finished` is folded in as an explicit
/// [`FailedCause::PromiseDropped`] rather than dropped from the list — an
/// absent dependency must never look like "nothing to report" to the fold.
pub async fn await_all_finished(dependencies: &[NodeHandle]) -> Vec<FinalCompileResult> {
    let waits = dependencies.iter().map(|d| async move {
        match d.finished.wait().await {
            Ok(result) => result,
            Err(PromiseError::WriterDropped) => {
                let project = dependency_name(d);
                error!(%project, "{}", Error::PromiseDropped(project.clone()));
                FinalCompileResult { project, result: CompileResult::NotOk(FailedCause::PromiseDropped) }
            }
        }
    });
    futures_util::future::join_all(waits).await
}

/// Flattens each dependency's own pickle chain (its own pickle, if any,
/// followed by its own upstream picklepath) in dependency-declaration
/// order, producing the depth-first-ordered transitive picklepath for this
/// node. A dropped dependency contributes nothing here — there is no pickle
/// to splice in — but it is never silently treated as *successful*: it
/// still surfaces through [`await_all_finished`], which gates whether
/// `setup`/`compile` run at all.
pub async fn await_pickle_chain(dependencies: &[NodeHandle]) -> Vec<PickleUri> {
    let waits = dependencies.iter().map(|d| d.pickle_chain.wait());
    futures_util::future::join_all(waits)
        .await
        .into_iter()
        .filter_map(Result::ok)
        .flatten()
        .collect()
}

/// Folds every dependency's own (already transitively-aggregated) Java
/// signal into one, so a node's signal always reflects every upstream that
/// contributed to it, not just its direct dependencies. A dependency whose
/// task panicked before completing `java_signal` is folded in as a
/// fail-fast, carrying its own name, rather than silently excluded.
pub async fn await_java_signal(dependencies: &[NodeHandle]) -> JavaSignal {
    let waits = dependencies.iter().map(|d| async move {
        match d.java_signal.wait().await {
            Ok(signal) => signal,
            Err(PromiseError::WriterDropped) => JavaSignal::fail_fast(dependency_name(d)),
        }
    });
    let signals = futures_util::future::join_all(waits).await;
    aggregate_java_signals(signals)
}

/// Folds a dependency's final result into the accumulator using the
/// *intransitive* names that actually block a parent: a dependency that was
/// itself synthesised as `Blocked(names)` (e.g. an `Aggregate` whose own
/// children disagreed) contributes those children's names rather than its
/// own synthetic identifier, so a grandparent never sees a meaningless
/// `"<aggregate>"` in its blocking list.
fn fold_partial(finals: &[FinalCompileResult]) -> PartialCompileResult {
    finals.iter().fold(PartialCompileResult::Empty, |acc, f| match &f.result {
        crate::result::CompileResult::Ok => acc.combine(f.project.clone(), true, "ok".into()),
        crate::result::CompileResult::NotOk(crate::result::FailedCause::Blocked(names)) if !names.is_empty() => {
            names.iter().fold(acc, |acc, name| acc.combine(name.clone(), false, "blocked".into()))
        }
        crate::result::CompileResult::NotOk(cause) => {
            acc.combine(f.project.clone(), false, format!("{cause:?}").into())
        }
    })
}

/// Used by pipelined assembly: dependencies may not have finished their
/// Java phase yet, so this only folds in the ones whose aggregated signal
/// has *already* settled, treating an unfinished dependency as neither a
/// success nor a failure. A dependent still sees an eventual upstream
/// failure through its own `transitive_java_signal` once the lazy
/// dependency finishes.
async fn fold_partial_from_ready_finals(dependencies: &[NodeHandle]) -> PartialCompileResult {
    use futures_util::FutureExt;

    let mut acc = PartialCompileResult::Empty;
    for dep in dependencies {
        if let Some(Ok(JavaSignal::FailFastCompilation(names))) = dep.java_signal.wait().now_or_never() {
            acc = names.into_iter().fold(acc, |acc, name| acc.combine(name, false, "upstream failed".into()));
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Platform;
    use crate::javasignal::JavaCompletion;
    use crate::promise::promise;
    use crate::result::PickleOutcome;

    /// A [`NodeHandle`] whose writer halves are all dropped immediately, as
    /// if the task that owned them had panicked before completing anything.
    fn crashed_dependency(name: &str) -> NodeHandle {
        let (pickle_w, pickle_r) = promise::<PickleOutcome>();
        let (chain_w, chain_r) = promise::<Vec<PickleUri>>();
        let (java_w, java_r) = promise::<JavaCompletion>();
        let (signal_w, signal_r) = promise::<JavaSignal>();
        let (finished_w, finished_r) = promise::<FinalCompileResult>();
        drop((pickle_w, chain_w, java_w, signal_w, finished_w));

        NodeHandle {
            project: Some(Project::new(name, Platform::Jvm)),
            pickle: pickle_r,
            pickle_chain: chain_r,
            complete_java: java_r,
            java_signal: signal_r,
            finished: finished_r,
        }
    }

    #[tokio::test]
    async fn a_crashed_dependency_is_folded_in_as_a_failure_not_dropped() {
        let dep = crashed_dependency("left");
        let finals = await_all_finished(&[dep]).await;

        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].project, ProjectId::from("left"));
        assert!(matches!(finals[0].result, CompileResult::NotOk(FailedCause::PromiseDropped)));
    }

    #[tokio::test]
    async fn a_crashed_dependency_fails_fast_the_java_signal() {
        let dep = crashed_dependency("right");
        let signal = await_java_signal(&[dep]).await;

        assert_eq!(signal, JavaSignal::fail_fast("right".into()));
    }
}
