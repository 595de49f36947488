//! The DAG walker: recursive, identity-memoised scheduling of compile tasks
//! over a [`Dag`].
//!
//! Each distinct node (by `Arc` identity, see [`NodeKey`]) is scheduled
//! exactly once no matter how many parents reach it — this is what makes a
//! diamond dependency compile its shared base exactly once instead of
//! twice.

use crate::bundle::{Project, SetupFn};
use crate::dag::{Dag, NodeKey};
use crate::ids::PickleUri;
use crate::inputs::{CompileFn, CompilerOracle, Inputs};
use crate::javasignal::{JavaCompletion, JavaSignal};
use crate::pipeline;
use crate::promise::{promise, PromiseReader, PromiseWriter};
use crate::report::Reporter;
use crate::result::{CompileResult, FinalCompileResult, PickleOutcome};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::FutureExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A scheduled node's public futures: its own pickle outcome, the pickle
/// chain it exposes to dependents, its own Java completion, its
/// transitively-aggregated Java signal, and its full final outcome. All may
/// be cloned and awaited from any number of dependents.
#[derive(Clone)]
pub struct NodeHandle {
    pub project: Option<Project>,
    pub pickle: PromiseReader<PickleOutcome>,
    /// This node's own pickle (if ready) followed by its own upstream
    /// picklepath — what a dependent splices into its own picklepath at
    /// this position.
    pub pickle_chain: PromiseReader<Vec<PickleUri>>,
    pub complete_java: PromiseReader<JavaCompletion>,
    pub java_signal: PromiseReader<JavaSignal>,
    pub finished: PromiseReader<FinalCompileResult>,
}

/// Shared, read-only configuration and memoisation state threaded through
/// every recursive call of a single [`DagWalker::traverse`] invocation.
pub struct WalkContext {
    pub setup: SetupFn,
    pub compile: CompileFn,
    pub reporter: Arc<dyn Reporter>,
    pub pipeline: bool,
    pub cancellation: CancellationToken,
    memo: DashMap<NodeKey, NodeHandle>,
}

impl WalkContext {
    pub fn new(
        setup: SetupFn,
        compile: CompileFn,
        reporter: Arc<dyn Reporter>,
        pipeline: bool,
        cancellation: CancellationToken,
    ) -> Self {
        Self { setup, compile, reporter, pipeline, cancellation, memo: DashMap::new() }
    }
}

/// Walks a DAG from its roots, scheduling every distinct node exactly once.
pub struct DagWalker {
    ctx: Arc<WalkContext>,
}

impl DagWalker {
    pub fn new(ctx: Arc<WalkContext>) -> Self {
        Self { ctx }
    }

    /// Schedules `node` and everything it (transitively) depends on,
    /// returning a handle to await its outcomes. Safe to call with the same
    /// `node` (by `Arc` identity) more than once — later calls are served
    /// from the memoisation table instantly.
    #[instrument(level = "trace", skip_all, fields(node = %describe(node)))]
    pub fn traverse(&self, node: &Arc<Dag>) -> NodeHandle {
        schedule(&self.ctx, node)
    }
}

fn describe(node: &Arc<Dag>) -> &str {
    node.project().map(|p| p.name.as_str()).unwrap_or("<aggregate>")
}

/// The memoised recursive scheduling function, dispatching on node shape.
/// Each DAG node's scheduling recurses into its dependencies before the
/// node's own entry is inserted, so the memoisation table must tolerate a
/// node being scheduled twice concurrently (the second caller just
/// discards its own handle and uses whichever was inserted first) — true of
/// `DashMap`'s entry API regardless of shard count.
fn schedule(ctx: &Arc<WalkContext>, node: &Arc<Dag>) -> NodeHandle {
    let key = NodeKey::of(node);
    if let Some(existing) = ctx.memo.get(&key) {
        return existing.clone();
    }

    let dependency_handles: Vec<NodeHandle> =
        node.dependencies().iter().map(|dep| schedule(ctx, dep)).collect();

    let handle = match &**node {
        Dag::Aggregate(_) => spawn_aggregate(dependency_handles),
        Dag::Leaf(project) | Dag::Parent { project, .. } => {
            spawn_project(ctx, project.clone(), dependency_handles)
        }
    };

    match ctx.memo.entry(key) {
        Entry::Occupied(existing) => existing.get().clone(),
        Entry::Vacant(slot) => {
            slot.insert(handle.clone());
            handle
        }
    }
}

/// An `Aggregate` node has no project of its own: it is "done" exactly when
/// every dependency is done, and its picklepath/signal pass its
/// dependencies' through unchanged. Nothing is ever compiled for it.
fn spawn_aggregate(dependencies: Vec<NodeHandle>) -> NodeHandle {
    let (pickle_w, pickle_r) = promise::<PickleOutcome>();
    let (chain_w, chain_r) = promise::<Vec<PickleUri>>();
    let (java_w, java_r) = promise::<JavaCompletion>();
    let (signal_w, signal_r) = promise::<JavaSignal>();
    let (final_w, final_r) = promise::<FinalCompileResult>();

    tokio::spawn(async move {
        pickle_w.complete(PickleOutcome::Unavailable);
        java_w.complete(JavaCompletion::Ready);

        chain_w.complete(pipeline::await_pickle_chain(&dependencies).await);
        signal_w.complete(pipeline::await_java_signal(&dependencies).await);

        let finals = pipeline::await_all_finished(&dependencies).await;
        let failed: Vec<_> = finals.iter().filter(|f| !f.result.is_ok()).map(|f| f.project.clone()).collect();
        final_w.complete(FinalCompileResult {
            project: "<aggregate>".into(),
            result: if failed.is_empty() { CompileResult::Ok } else { CompileResult::blocked(failed) },
        });
    });

    NodeHandle { project: None, pickle: pickle_r, pickle_chain: chain_r, complete_java: java_r, java_signal: signal_r, finished: final_r }
}

/// A `Leaf`/`Parent` node: run `setup`/`compile` once its dependencies are
/// ready enough (per the normal or pipeline assembly policy), completing its
/// own pickle/java promises as `compile` drives them (or, failing that,
/// falling back to [`apply_pickle_completion_policy`]) and its final promise
/// once `compile` returns.
fn spawn_project(ctx: &Arc<WalkContext>, project: Project, dependencies: Vec<NodeHandle>) -> NodeHandle {
    let (pickle_w, pickle_r) = promise::<PickleOutcome>();
    let (chain_w, chain_r) = promise::<Vec<PickleUri>>();
    let (java_w, java_r) = promise::<JavaCompletion>();
    let (signal_w, signal_r) = promise::<JavaSignal>();
    let (final_w, final_r) = promise::<FinalCompileResult>();

    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let name = project.name.clone();
        ctx.reporter.on_schedule(&name);

        if ctx.cancellation.is_cancelled() {
            pickle_w.complete(PickleOutcome::Unavailable);
            chain_w.complete(Vec::new());
            java_w.complete(JavaCompletion::Failed("cancelled".into()));
            signal_w.complete(JavaSignal::fail_fast(name.clone()));
            final_w.complete(FinalCompileResult { project: name, result: cancelled() });
            return;
        }

        let assembly = if ctx.pipeline {
            pipeline::assemble_pipelined(&ctx, &project, &dependencies).await
        } else {
            pipeline::assemble_normal(&ctx, &project, &dependencies).await
        };

        let (bundle, picklepath) = match assembly {
            crate::pipeline::Assembly::Blocked(cause) => {
                ctx.reporter.on_blocked(&name, &cause.blocking);
                pickle_w.complete(PickleOutcome::Unavailable);
                chain_w.complete(Vec::new());
                java_w.complete(JavaCompletion::Failed("blocked".into()));
                signal_w.complete(JavaSignal::fail_fast(name.clone()));
                final_w.complete(FinalCompileResult {
                    project: name,
                    result: CompileResult::NotOk(cause.into()),
                });
                return;
            }
            crate::pipeline::Assembly::SetupFailed(message) => {
                pickle_w.complete(PickleOutcome::Unavailable);
                chain_w.complete(Vec::new());
                java_w.complete(JavaCompletion::Failed(message.clone()));
                signal_w.complete(JavaSignal::fail_fast(name.clone()));
                final_w.complete(FinalCompileResult {
                    project: name,
                    result: CompileResult::NotOk(crate::result::FailedCause::SetupFailed(message)),
                });
                return;
            }
            crate::pipeline::Assembly::Ready { bundle, picklepath } => (bundle, picklepath),
        };

        let java_only = bundle.java_only;
        let pipeline_requested = ctx.pipeline;
        let oracle = build_oracle(&dependencies);
        let transitive_java_signal = {
            let deps = dependencies.clone();
            Box::pin(async move { pipeline::await_java_signal(&deps).await })
                as futures_core::future::BoxFuture<'static, JavaSignal>
        };

        let inputs = Inputs {
            bundle,
            picklepath: picklepath.clone(),
            pickle_ready: Arc::clone(&pickle_w),
            complete_java: Arc::clone(&java_w),
            transitive_java_signal,
            oracle,
            separate_java_and_scala: pipeline_requested,
        };

        // `compile` may complete `pickle_ready` long before it returns (that's
        // the whole point of pipelining): forward that completion into this
        // node's `pickle_chain` on its own task, racing it rather than the
        // full compile future, so a dependent sees this node as soon as its
        // pickle — not its full compilation — is ready.
        tokio::spawn(forward_pickle_chain(pickle_r.clone(), picklepath.clone(), Arc::clone(&chain_w)));

        let cancellation = ctx.cancellation.clone();
        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => cancelled(),
            result = (ctx.compile)(inputs) => result,
        };

        apply_pickle_completion_policy(&ctx, &name, &pickle_w, &pickle_r, &result, pipeline_requested, java_only);

        if !java_w.is_completed() {
            let completion = if result.is_ok() {
                JavaCompletion::Ready
            } else {
                JavaCompletion::Failed("compile reported failure".into())
            };
            java_w.complete(completion);
        }
        ctx.reporter.on_java_complete(&name, result.is_ok());

        let own_signal = if result.is_ok() { JavaSignal::continue_() } else { JavaSignal::fail_fast(name.clone()) };
        let upstream_signal = pipeline::await_java_signal(&dependencies).await;
        signal_w.complete(own_signal.combine(upstream_signal));

        ctx.reporter.on_finished(&name, &result);
        final_w.complete(FinalCompileResult { project: name, result });
    });

    NodeHandle { project: Some(project), pickle: pickle_r, pickle_chain: chain_r, complete_java: java_r, java_signal: signal_r, finished: final_r }
}

/// Builds the per-node oracle out of whichever direct dependencies declared
/// Java sources of their own.
fn build_oracle(dependencies: &[NodeHandle]) -> CompilerOracle {
    let entries = dependencies
        .iter()
        .filter_map(|d| {
            let project = d.project.as_ref()?;
            if project.java_sources.is_empty() {
                return None;
            }
            Some((project.name.clone(), d.complete_java.clone()))
        })
        .collect();
    CompilerOracle::new(entries)
}

/// Guarantees the pickle promise always reaches a terminal state even if
/// `compile` never completed it itself, and reports the cases worth a
/// human's attention: a failed compile fails its pickle too, and a
/// successful pipelined compile that never produced a pickle is flagged as
/// pipelining going unused.
fn apply_pickle_completion_policy(
    ctx: &WalkContext,
    name: &crate::ids::ProjectId,
    pickle_w: &Arc<PromiseWriter<PickleOutcome>>,
    pickle_r: &PromiseReader<PickleOutcome>,
    result: &CompileResult,
    pipeline_requested: bool,
    java_only: bool,
) {
    if !pickle_w.is_completed() {
        match result {
            CompileResult::NotOk(_) => pickle_w.complete(PickleOutcome::Failed),
            CompileResult::Ok => {
                pickle_w.complete(PickleOutcome::Unavailable);
                if pipeline_requested && !java_only {
                    ctx.reporter.on_pipelining_not_used(name);
                }
            }
        }
        return;
    }

    match pickle_r.wait().now_or_never() {
        Some(Ok(PickleOutcome::Ready(uri))) => ctx.reporter.on_pickle_ready(name, Some(&uri)),
        Some(Ok(PickleOutcome::Unavailable)) if pipeline_requested && !java_only => {
            ctx.reporter.on_pipelining_not_used(name)
        }
        _ => {}
    }
}

async fn own_pickle_chain(pickle_r: &PromiseReader<PickleOutcome>, picklepath: &[PickleUri]) -> Vec<PickleUri> {
    let mut chain = Vec::new();
    if let Ok(PickleOutcome::Ready(uri)) = pickle_r.wait().await {
        chain.push(uri);
    }
    chain.extend(picklepath.iter().cloned());
    chain
}

/// Completes `chain_w` the moment `pickle_r` settles, independent of how
/// long the node's own full compile future takes to resolve afterwards —
/// this is what lets a dependent start as soon as this node's pickle is
/// ready rather than once this node is fully compiled.
async fn forward_pickle_chain(
    pickle_r: PromiseReader<PickleOutcome>,
    picklepath: Vec<PickleUri>,
    chain_w: Arc<PromiseWriter<Vec<PickleUri>>>,
) {
    chain_w.complete(own_pickle_chain(&pickle_r, &picklepath).await);
}

fn cancelled() -> CompileResult {
    CompileResult::NotOk(crate::result::FailedCause::Cancelled)
}
