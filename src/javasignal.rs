//! The Java-compilation signal monoid.
//!
//! Once a project's own (non-Java) compile phase finishes, its dependents
//! need to know whether it is safe to continue compiling the dependent's
//! Java sources, or whether the whole dependent chain should fail fast. The
//! signal from several dependencies combines associatively: any single
//! `FailFastCompilation` poisons the result, and the poisoned names
//! accumulate rather than short-circuit, so every contributing failure is
//! still visible to the collector.

use crate::ids::ProjectId;
use std::sync::Arc;

/// The raw outcome of a single node's own Java-compilation phase, as
/// observed directly through the [`crate::inputs::CompilerOracle`] an
/// upstream exposes to its dependents.
///
/// Distinct from [`JavaSignal`]: this is one node's unaggregated
/// completion, not the already-folded transitive view a dependent's
/// compiler consults before referencing upstream Java symbols.
#[derive(Debug, Clone)]
pub enum JavaCompletion {
    Ready,
    Failed(Arc<str>),
}

impl JavaCompletion {
    pub fn is_ready(&self) -> bool {
        matches!(self, JavaCompletion::Ready)
    }
}

/// Whether downstream Java compilation should continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavaSignal {
    ContinueCompilation,
    FailFastCompilation(Vec<ProjectId>),
}

impl JavaSignal {
    pub fn continue_() -> Self {
        JavaSignal::ContinueCompilation
    }

    pub fn fail_fast(name: ProjectId) -> Self {
        JavaSignal::FailFastCompilation(vec![name])
    }

    /// Associative combination: `Continue` is the identity element;
    /// `FailFast` merges name lists rather than picking one.
    pub fn combine(self, other: JavaSignal) -> JavaSignal {
        match (self, other) {
            (JavaSignal::ContinueCompilation, other) => other,
            (this, JavaSignal::ContinueCompilation) => this,
            (JavaSignal::FailFastCompilation(mut a), JavaSignal::FailFastCompilation(b)) => {
                a.extend(b);
                JavaSignal::FailFastCompilation(a)
            }
        }
    }

    pub fn should_fail_fast(&self) -> bool {
        matches!(self, JavaSignal::FailFastCompilation(_))
    }
}

impl Default for JavaSignal {
    fn default() -> Self {
        JavaSignal::ContinueCompilation
    }
}

/// Folds a set of concurrently-awaited dependency signals into one, in the
/// order they complete — not the order they were submitted — since the
/// combination is associative and commutative in everything but poisoned
/// name order, which is irrelevant to callers.
pub fn aggregate_java_signals(signals: impl IntoIterator<Item = JavaSignal>) -> JavaSignal {
    signals.into_iter().fold(JavaSignal::default(), JavaSignal::combine)
}
