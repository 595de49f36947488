//! Projects and the bundle-setup phase that turns a [`Project`] plus its
//! upstream pickle dependencies into a ready-to-compile [`Inputs`] value (or
//! an early, non-blocking [`EarlyResult`]).
//!
//! Grounded on `foundry_compilers::Project`'s builder-constructed,
//! platform-aware project description, and on
//! `foundry_compilers::compilers::CompilerInput`'s role as "the thing a
//! `setup` step hands to `compile`".

use crate::ids::{PickleUri, ProjectId};
use std::path::PathBuf;
use std::sync::Arc;

/// The target platform a project compiles for. Only affects how `setup`
/// chooses to assemble compiler arguments — the scheduling core never
/// branches on it itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Jvm,
    Js,
    Native,
}

/// A node of the project DAG as seen by the scheduling core: a name, its own
/// sources, and whatever static metadata `setup` needs to assemble compiler
/// arguments. Dependency edges are not stored here — they live in the
/// [`crate::dag::Dag`] structure that wraps projects into a graph.
#[derive(Debug, Clone)]
pub struct Project {
    pub name: ProjectId,
    pub sources: Vec<PathBuf>,
    pub java_sources: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub compile_options: Vec<String>,
    pub platform: Platform,
    /// The compiler version this project is pinned to, if any. Purely
    /// descriptive metadata as far as the scheduling core is concerned —
    /// `setup` is free to use it to pick a toolchain, but nothing here
    /// branches on it.
    pub compiler_version: Option<semver::Version>,
}

impl Project {
    pub fn new(name: impl Into<ProjectId>, platform: Platform) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            java_sources: Vec::new(),
            classpath: Vec::new(),
            compile_options: Vec::new(),
            platform,
            compiler_version: None,
        }
    }

    pub fn with_compiler_version(mut self, version: semver::Version) -> Self {
        self.compiler_version = Some(version);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_java_sources(mut self, sources: impl IntoIterator<Item = PathBuf>) -> Self {
        self.java_sources.extend(sources);
        self
    }

    pub fn with_classpath(mut self, entries: impl IntoIterator<Item = PathBuf>) -> Self {
        self.classpath.extend(entries);
        self
    }
}

/// An opaque handle to a prepared compiler, produced by `setup` and consumed
/// by `compile`. The scheduling core never looks inside it — it only ever
/// moves it from one closure's output to the other's input.
#[derive(Debug, Clone)]
pub struct CompilerInstance(Arc<dyn std::any::Any + Send + Sync>);

impl CompilerInstance {
    pub fn new<T: std::any::Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn downcast_ref<T: std::any::Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

/// The outcome of bundle setup for a single project, before any compile
/// operation has run: either everything needed to invoke `compile` is ready
/// (`Ready`), or the node is already a terminal failure and must be
/// propagated without ever calling `compile` (`Early`).
///
/// Mirrors `Project::compile`'s "configure or bail before spawning solc"
/// split, generalised past a single Solidity toolchain.
#[derive(Debug, Clone)]
pub enum EarlyResult {
    /// Setup failed outright (e.g. the project's sources don't exist, or a
    /// required upstream pickle could not be read).
    SetupFailed { project: ProjectId, message: Arc<str> },
}

/// The materialised inputs to a `compile` call: the project's own sources
/// plus whatever pickles its dependencies produced, merged onto the
/// classpath the way a real toolchain expects to see them.
#[derive(Debug, Clone)]
pub struct CompileBundle {
    pub project: ProjectId,
    pub sources: Vec<PathBuf>,
    pub instance: Option<CompilerInstance>,
    /// This project's own Java sources, carried alongside the Scala/Kotlin
    /// ones so the oracle built for this node's dependents knows whether to
    /// expose a `complete_java` entry for it at all.
    pub java_sources: Vec<PathBuf>,
    /// True if this project has nothing but Java sources — `setup` sets
    /// this so the coordinator can tell a java-only project's declined
    /// pickle apart from a pipelining opt-out worth warning about.
    pub java_only: bool,
}

impl CompileBundle {
    /// Splits a bundle into the pieces `compile` actually needs: the source
    /// list, the prepared instance (if `setup` produced one), and whether
    /// the project is Java-only.
    pub fn to_sources_and_instance(self) -> (Vec<PathBuf>, Option<CompilerInstance>, bool) {
        (self.sources, self.instance, self.java_only)
    }
}

/// Invoked once per project, after all of its dependencies' pickle promises
/// have resolved, to assemble the bundle `compile` will consume. Returning
/// `Err` produces an [`EarlyResult::SetupFailed`] for that node instead of a
/// `compile` call.
pub type SetupFn = Arc<
    dyn Fn(&Project, &[crate::ids::PickleUri]) -> Result<CompileBundle, EarlyResult> + Send + Sync,
>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiler_instance_round_trips_through_downcast() {
        let instance = CompilerInstance::new(42u32);
        assert_eq!(instance.downcast_ref::<u32>(), Some(&42));
        assert_eq!(instance.downcast_ref::<String>(), None);
    }

    #[test]
    fn bundle_split_preserves_java_only_flag() {
        let bundle = CompileBundle {
            project: "a".into(),
            sources: vec![PathBuf::from("a.src")],
            instance: None,
            java_sources: Vec::new(),
            java_only: true,
        };
        let (sources, instance, java_only) = bundle.to_sources_and_instance();
        assert_eq!(sources, vec![PathBuf::from("a.src")]);
        assert!(instance.is_none());
        assert!(java_only);
    }
}
