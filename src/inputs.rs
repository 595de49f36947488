//! Assembly of a node's [`Inputs`]: the bundle plus everything `compile`
//! needs to drive this node's half of the pipelining protocol — the
//! upstream picklepath, this node's own pickle/java promises, the
//! transitive Java signal, and a per-node oracle into its direct upstreams'
//! own Java completions.
//!
//! Two assembly policies populate the `picklepath`/blocking decision ahead
//! of calling `setup`: normal mode waits for full compiles of every
//! dependency ([`crate::pipeline::assemble_normal`]), pipeline mode waits
//! only for pickles ([`crate::pipeline::assemble_pipelined`]). Both converge
//! on this same `Inputs` shape before handing off to `compile`.

use crate::bundle::CompileBundle;
use crate::ids::{PickleUri, ProjectId};
use crate::javasignal::{JavaCompletion, JavaSignal};
use crate::promise::{PromiseReader, PromiseWriter};
use crate::result::{CompileResult, PickleOutcome};
use futures_core::future::BoxFuture;
use std::sync::Arc;

/// Per-upstream visibility into whether an upstream's own Java compilation
/// has finished, so `compile` can decide whether it's safe to reference
/// that upstream's Java symbols yet.
///
/// Built fresh for each scheduled node from whichever direct dependencies
/// declared Java sources of their own — a dependency with no Java sources
/// has nothing to gate on, so it never gets an entry.
#[derive(Clone, Default)]
pub struct CompilerOracle {
    entries: Vec<(ProjectId, PromiseReader<JavaCompletion>)>,
}

impl CompilerOracle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(entries: Vec<(ProjectId, PromiseReader<JavaCompletion>)>) -> Self {
        Self { entries }
    }

    /// The upstream's own Java-completion promise, if `project` is one of
    /// the upstreams this oracle was built from.
    pub fn java_complete(&self, project: &ProjectId) -> Option<&PromiseReader<JavaCompletion>> {
        self.entries.iter().find(|(p, _)| p == project).map(|(_, r)| r)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectId> {
        self.entries.iter().map(|(p, _)| p)
    }
}

/// Everything a single `compile` invocation needs: the assembled bundle,
/// the upstream pickles it may reference, and the promises/signals it is
/// responsible for driving.
///
/// `compile` owns `pickle_ready` and `complete_java` for the duration of the
/// call: it should complete them as soon as the corresponding phase of its
/// own work finishes, rather than waiting until it returns. If it returns
/// without completing `pickle_ready`, the coordinator completes it on
/// `compile`'s behalf based on whether the call succeeded, so a dependent's
/// wait never hangs.
pub struct Inputs {
    pub bundle: CompileBundle,
    /// Upstream pickle URIs, in depth-first dependency order.
    pub picklepath: Vec<PickleUri>,
    pub pickle_ready: Arc<PromiseWriter<PickleOutcome>>,
    pub complete_java: Arc<PromiseWriter<JavaCompletion>>,
    /// The aggregated Java signal of every transitive upstream. Lazy:
    /// awaiting it blocks until every contributing upstream's own
    /// completion has settled, so `compile` should only await it during its
    /// late (Java) phase, not its early (pickle) one.
    pub transitive_java_signal: BoxFuture<'static, JavaSignal>,
    pub oracle: CompilerOracle,
    /// True iff the walk that scheduled this node is running in pipeline
    /// mode, i.e. Java and Scala compilation are being driven as separate,
    /// overlapping phases rather than one blocking step.
    pub separate_java_and_scala: bool,
}

/// Invoked once per project whose bundle was successfully assembled. The
/// scheduling core treats this as an opaque, possibly long-running
/// operation — it only ever awaits the future it returns.
pub type CompileFn = Arc<dyn Fn(Inputs) -> BoxFuture<'static, CompileResult> + Send + Sync>;
