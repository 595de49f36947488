//! Flattening a set of requested root nodes into the full set of distinct
//! projects they reach, awaiting every final result, and aggregating them
//! into a build-wide exit status, plus the sequential-mode pre-check that
//! rejects a build up front instead of scheduling anything at all.

use crate::dag::{Dag, NodeKey};
use crate::error::{Error, Result};
use crate::ids::ProjectId;
use crate::result::{CompileResult, FinalCompileResult};
use crate::walker::{DagWalker, NodeHandle};
use std::collections::{HashMap, HashSet};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

/// The build-wide outcome, once every reachable project has a final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    Failed,
}

/// Lookup of a project's outcome from a previous invocation of the
/// scheduler, plus the two mutations a build invocation itself needs to
/// keep that lookup current: recording this invocation's own outcomes, and
/// reading back a full snapshot to hand to the caller afterwards.
/// Retention/eviction policy for what's in the store is a different concern
/// entirely, left to whatever backs this trait.
pub trait PreviousResults: Send + Sync {
    fn get(&self, project: &ProjectId) -> Option<CompileResult>;

    /// Records this invocation's outcome for `project`, overwriting whatever
    /// was previously stored for it.
    fn record(&mut self, project: ProjectId, result: CompileResult);

    /// Everything this store currently knows, used to seed the cache
    /// `compile` hands back on [`crate::scheduler::BuildState`].
    fn snapshot(&self) -> HashMap<ProjectId, CompileResult>;
}

/// A `PreviousResults` backed by a plain map, sufficient for tests and
/// embedders that don't need anything fancier.
#[derive(Default, Clone)]
pub struct HashMapPreviousResults(pub std::collections::HashMap<ProjectId, CompileResult>);

impl PreviousResults for HashMapPreviousResults {
    fn get(&self, project: &ProjectId) -> Option<CompileResult> {
        self.0.get(project).cloned()
    }

    fn record(&mut self, project: ProjectId, result: CompileResult) {
        self.0.insert(project, result);
    }

    fn snapshot(&self) -> HashMap<ProjectId, CompileResult> {
        self.0.clone()
    }
}

/// A [`PreviousResults`] persisted to a JSON file between build invocations,
/// so a sequential-mode caller can carry forward what failed last time
/// without recompiling.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct JsonPreviousResults(HashMap<ProjectId, CompileResult>);

impl JsonPreviousResults {
    /// Reads a previously written results file. Grounded on the scheduling
    /// core needing the same durability the rest of the ecosystem gets from
    /// a plain JSON cache file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| Error::io(source, path))?;
        let results = serde_json::from_reader(std::io::BufReader::new(file))?;
        trace!("read previous results from {}", path.display());
        Ok(Self(results))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|source| Error::io(source, path))?;
        serde_json::to_writer(BufWriter::new(file), &self.0)?;
        trace!("wrote previous results to {}", path.display());
        Ok(())
    }

    pub fn record(&mut self, project: ProjectId, result: CompileResult) {
        self.0.insert(project, result);
    }
}

impl PreviousResults for JsonPreviousResults {
    fn get(&self, project: &ProjectId) -> Option<CompileResult> {
        self.0.get(project).cloned()
    }

    fn record(&mut self, project: ProjectId, result: CompileResult) {
        self.0.insert(project, result);
    }

    fn snapshot(&self) -> HashMap<ProjectId, CompileResult> {
        self.0.clone()
    }
}

/// Depth-first, identity-deduplicated flattening of a set of root nodes into
/// every distinct node they reach, dependencies before dependents — the
/// same order a human reading the graph bottom-up would list them in.
pub fn flatten_dag(roots: &[Arc<Dag>]) -> Vec<Arc<Dag>> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for root in roots {
        visit(root, &mut seen, &mut order);
    }
    order
}

fn visit(node: &Arc<Dag>, seen: &mut HashSet<NodeKey>, order: &mut Vec<Arc<Dag>>) {
    if !seen.insert(NodeKey::of(node)) {
        return;
    }
    for dep in node.dependencies() {
        visit(dep, seen, order);
    }
    order.push(node.clone());
}

/// Rejects a sequential-mode build before anything is scheduled: if any
/// reachable project previously failed to compile, the whole build is
/// refused rather than re-attempting it node by node.
pub fn sequential_precheck(
    roots: &[Arc<Dag>],
    previous: &dyn PreviousResults,
) -> crate::error::Result<()> {
    for node in flatten_dag(roots) {
        if let Some(project) = node.project() {
            if let Some(CompileResult::NotOk(_)) = previous.get(&project.name) {
                return Err(crate::error::Error::SequentialDependencyFailed(project.name.clone()));
            }
        }
    }
    Ok(())
}

/// Schedules, awaits and aggregates every project reachable from `roots`.
pub struct ResultCollector<'a> {
    walker: &'a DagWalker,
}

impl<'a> ResultCollector<'a> {
    pub fn new(walker: &'a DagWalker) -> Self {
        Self { walker }
    }

    #[instrument(level = "trace", skip_all, fields(roots = roots.len()))]
    pub async fn collect(&self, roots: &[Arc<Dag>]) -> (Vec<FinalCompileResult>, ExitStatus) {
        let nodes = flatten_dag(roots);
        let handles: Vec<NodeHandle> = nodes.iter().map(|n| self.walker.traverse(n)).collect();
        let finals = crate::pipeline::await_all_finished(&handles).await;
        let status =
            if finals.iter().all(|f| f.result.is_ok()) { ExitStatus::Ok } else { ExitStatus::Failed };
        (finals, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Platform, Project};
    use crate::result::FailedCause;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_previous_results_round_trips_through_disk() {
        let mut results = JsonPreviousResults::default();
        results.record("base".into(), CompileResult::Ok);
        results.record("left".into(), CompileResult::NotOk(FailedCause::CompileFailed("boom".into())));

        let path = std::env::temp_dir()
            .join(format!("pickle-sched-previous-results-{}.json", std::process::id()));
        results.write(&path).unwrap();
        let read_back = JsonPreviousResults::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(read_back.get(&"base".into()), Some(CompileResult::Ok));
        assert!(matches!(
            read_back.get(&"left".into()),
            Some(CompileResult::NotOk(FailedCause::CompileFailed(_)))
        ));
        assert_eq!(read_back.get(&"missing".into()), None);
    }

    #[test]
    fn flatten_visits_a_shared_dependency_once() {
        let base = Dag::leaf(Project::new("base", Platform::Jvm));
        let left = Dag::parent(Project::new("left", Platform::Jvm), vec![Arc::clone(&base)]);
        let right = Dag::parent(Project::new("right", Platform::Jvm), vec![Arc::clone(&base)]);

        let flattened = flatten_dag(&[left, right]);
        let names: Vec<&str> =
            flattened.iter().filter_map(|n| n.project().map(|p| p.name.as_str())).collect();

        assert_eq!(names.iter().filter(|&&n| n == "base").count(), 1);
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn flatten_orders_dependencies_before_dependents() {
        let base = Dag::leaf(Project::new("base", Platform::Jvm));
        let parent = Dag::parent(Project::new("parent", Platform::Jvm), vec![base]);

        let flattened = flatten_dag(&[parent]);
        let names: Vec<&str> =
            flattened.iter().filter_map(|n| n.project().map(|p| p.name.as_str())).collect();

        assert_eq!(names, vec!["base", "parent"]);
    }

    #[test]
    fn sequential_precheck_rejects_a_previously_failed_dependency() {
        let base = Dag::leaf(Project::new("base", Platform::Jvm));
        let parent = Dag::parent(Project::new("parent", Platform::Jvm), vec![base]);

        let mut previous = HashMapPreviousResults::default();
        previous.0.insert("base".into(), CompileResult::NotOk(FailedCause::CompileFailed("boom".into())));

        let err = sequential_precheck(&[parent], &previous).unwrap_err();
        assert!(matches!(err, crate::error::Error::SequentialDependencyFailed(name) if name.as_str() == "base"));
    }

    #[test]
    fn sequential_precheck_passes_when_nothing_previously_failed() {
        let base = Dag::leaf(Project::new("base", Platform::Jvm));
        let previous = HashMapPreviousResults::default();
        assert!(sequential_precheck(&[base], &previous).is_ok());
    }
}
