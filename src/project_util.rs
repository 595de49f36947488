//! Fixture helpers for building ad-hoc, on-disk project DAGs in tests and
//! examples (gated behind the `project-util` feature, mirroring the
//! teacher's own `project_util` module).

use crate::bundle::{Platform, Project};
use crate::dag::Dag;
use crate::ids::ProjectId;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A project backed by a real temporary directory, so `setup`/`compile`
/// implementations under test can do genuine filesystem I/O instead of
/// operating on in-memory stand-ins.
pub struct TempProject {
    _root: TempDir,
    pub project: Project,
}

impl TempProject {
    /// Creates a new temp directory containing a single source file, and
    /// the [`Project`] describing it.
    pub fn new(name: impl Into<ProjectId>, platform: Platform, source: &str) -> std::io::Result<Self> {
        let root = TempDir::new()?;
        let src_path: PathBuf = root.path().join("Main.src");
        std::fs::write(&src_path, source)?;

        let project = Project::new(name, platform).with_sources([src_path]);
        Ok(Self { _root: root, project })
    }

    pub fn path(&self) -> &std::path::Path {
        self._root.path()
    }
}

/// Builds the linear chain `a -> b -> c`: `a` depends on `b`, which depends
/// on `c`.
pub fn linear_chain(names: [&str; 3]) -> Arc<Dag> {
    let [a, b, c] = names;
    let leaf_c = Dag::leaf(Project::new(c, Platform::Jvm));
    let node_b = Dag::parent(Project::new(b, Platform::Jvm), vec![leaf_c]);
    Dag::parent(Project::new(a, Platform::Jvm), vec![node_b])
}

/// Builds the diamond `a -> b, a -> c, d -> b, d -> c`: `b` and `c` are each
/// shared dependencies of two distinct parents, so a correct walker
/// compiles them exactly once.
pub fn diamond(names: [&str; 4]) -> [Arc<Dag>; 2] {
    let [a, b, c, d] = names;
    let node_b = Dag::leaf(Project::new(b, Platform::Jvm));
    let node_c = Dag::leaf(Project::new(c, Platform::Jvm));
    let node_a = Dag::parent(Project::new(a, Platform::Jvm), vec![Arc::clone(&node_b), Arc::clone(&node_c)]);
    let node_d = Dag::parent(Project::new(d, Platform::Jvm), vec![node_b, node_c]);
    [node_a, node_d]
}
