//! The scheduler facade: a single `compile` entry point that wires the DAG
//! walker, the pipeline assembly policies and the result collector together
//! behind a builder-configured set of options.
//!
//! Grounded on `foundry_compilers::Project`'s construction via a builder
//! (`ProjectBuilder`) that is filled in with `with_*` calls and finalised
//! with `build()`.

use crate::bundle::SetupFn;
use crate::collector::{sequential_precheck, ExitStatus, HashMapPreviousResults, PreviousResults, ResultCollector};
use crate::dag::Dag;
use crate::error::{Error, Result};
use crate::inputs::CompileFn;
use crate::walker::{DagWalker, WalkContext};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which kind of caller is driving this build, so the scheduler can adjust
/// how tolerant it is of partial results without changing its algebra. An
/// IDE-style caller typically wants every reachable pickle even on
/// failure; a one-shot CLI build only cares about the final exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMode {
    Cli,
    Ide,
}

impl Default for UserMode {
    fn default() -> Self {
        UserMode::Cli
    }
}

/// Fully resolved scheduling configuration, produced by [`SchedulerBuilder::build`].
#[derive(Clone)]
pub struct ScheduleOptions {
    /// Refuse to schedule a build at all if any reachable project
    /// previously failed to compile.
    pub sequential: bool,
    /// Assemble each node's inputs from dependencies' pickles as soon as
    /// they're ready, rather than waiting for full compiles.
    pub pipeline: bool,
    /// Schedule the root's dependencies without compiling the root project
    /// itself.
    pub exclude_root: bool,
    pub user_mode: UserMode,
    pub setup: SetupFn,
    pub compile: CompileFn,
}

/// Builds a [`ScheduleOptions`] value. `setup` and `compile` are mandatory;
/// everything else defaults to the least surprising behaviour (no
/// sequential gate, no pipelining, root included).
#[derive(Default)]
pub struct SchedulerBuilder {
    sequential: bool,
    pipeline: bool,
    exclude_root: bool,
    user_mode: UserMode,
    setup: Option<SetupFn>,
    compile: Option<CompileFn>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    pub fn pipeline(mut self, pipeline: bool) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn exclude_root(mut self, exclude_root: bool) -> Self {
        self.exclude_root = exclude_root;
        self
    }

    pub fn user_mode(mut self, user_mode: UserMode) -> Self {
        self.user_mode = user_mode;
        self
    }

    pub fn setup(mut self, setup: SetupFn) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn compile(mut self, compile: CompileFn) -> Self {
        self.compile = Some(compile);
        self
    }

    pub fn build(self) -> Result<ScheduleOptions> {
        Ok(ScheduleOptions {
            sequential: self.sequential,
            pipeline: self.pipeline,
            exclude_root: self.exclude_root,
            user_mode: self.user_mode,
            setup: self.setup.ok_or_else(|| Error::msg("scheduler builder: no setup function provided"))?,
            compile: self
                .compile
                .ok_or_else(|| Error::msg("scheduler builder: no compile function provided"))?,
        })
    }
}

/// The outcome of a single `compile` invocation.
pub struct BuildState {
    pub results: Vec<crate::result::FinalCompileResult>,
    pub status: ExitStatus,
    /// The result cache as it stands after this invocation: everything
    /// `previous` already knew, updated with whatever this invocation just
    /// produced — spec.md §4.5 step 3's "accumulate results into the build
    /// state's result cache". Feed this back in as `previous` on the next
    /// call so §4.6's sequential pre-check sees this invocation's outcomes.
    pub cache: HashMapPreviousResults,
}

/// Schedules and runs a full build rooted at `root`. This is the only entry
/// point the rest of the crate exists to support.
#[instrument(skip_all, fields(root = %root.project().map(|p| p.name.as_str()).unwrap_or("<aggregate>")))]
pub async fn compile(
    root: &Arc<Dag>,
    options: &ScheduleOptions,
    previous: &mut dyn PreviousResults,
    cancellation: CancellationToken,
) -> Result<BuildState> {
    let roots: Vec<Arc<Dag>> =
        if options.exclude_root { root.dependencies().to_vec() } else { vec![Arc::clone(root)] };

    if options.sequential {
        sequential_precheck(&roots, &*previous)?;
    }

    let ctx = Arc::new(WalkContext::new(
        options.setup.clone(),
        options.compile.clone(),
        crate::report::current(),
        options.pipeline,
        cancellation,
    ));
    let walker = DagWalker::new(ctx);
    let collector = ResultCollector::new(&walker);
    let (results, status) = collector.collect(&roots).await;

    for result in &results {
        previous.record(result.project.clone(), result.result.clone());
    }
    let cache = HashMapPreviousResults(previous.snapshot());

    Ok(BuildState { results, status, cache })
}

/// Convenience for embedders that have no prior-invocation state at all.
pub fn no_previous_results() -> impl PreviousResults {
    crate::collector::HashMapPreviousResults::default()
}
