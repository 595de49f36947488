//! End-to-end scheduling scenarios against an in-memory fake compiler,
//! covering the six scenarios a correct implementation must satisfy.

use pickle_sched::bundle::CompileBundle;
use pickle_sched::collector::ExitStatus;
use pickle_sched::result::CompileResult;
use pickle_sched::{
    compile, no_previous_results, scheduler::SchedulerBuilder, Dag, Error, FailedCause,
    HashMapPreviousResults, Inputs, JavaCompletion, Platform, PickleOutcome, PickleUri, Project,
    SetupFn,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Records how many times, and with what picklepath, each project was
/// handed to the fake `compile`.
#[derive(Clone, Default)]
struct Harness {
    counts: Arc<Mutex<HashMap<String, usize>>>,
    picklepaths: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl Harness {
    fn record(&self, project: &str, picklepath: &[PickleUri]) {
        *self.counts.lock().unwrap().entry(project.to_string()).or_default() += 1;
        self.picklepaths.lock().unwrap().insert(
            project.to_string(),
            picklepath.iter().map(|p| p.as_str().to_string()).collect(),
        );
    }

    fn count(&self, project: &str) -> usize {
        *self.counts.lock().unwrap().get(project).unwrap_or(&0)
    }

    fn picklepath(&self, project: &str) -> Vec<String> {
        self.picklepaths.lock().unwrap().get(project).cloned().unwrap_or_default()
    }
}

fn fake_setup() -> SetupFn {
    Arc::new(|project, _picklepath| {
        Ok(CompileBundle {
            project: project.name.clone(),
            sources: project.sources.clone(),
            instance: None,
            java_sources: project.java_sources.clone(),
            java_only: project.sources.is_empty() && !project.java_sources.is_empty(),
        })
    })
}

/// Builds a `compile` operation that fails for every project named in
/// `failing`, and otherwise produces a deterministic pickle URI and
/// records each invocation on `harness`.
fn fake_compile(harness: Harness, failing: &'static [&'static str]) -> pickle_sched::CompileFn {
    let failing: HashSet<&'static str> = failing.iter().copied().collect();
    Arc::new(move |inputs: Inputs| {
        let harness = harness.clone();
        let failing = failing.clone();
        Box::pin(async move {
            let name = inputs.bundle.project.clone();
            harness.record(name.as_str(), &inputs.picklepath);

            if failing.contains(name.as_str()) {
                inputs.pickle_ready.complete(PickleOutcome::Failed);
                inputs.complete_java.complete(JavaCompletion::Failed("boom".into()));
                return CompileResult::NotOk(FailedCause::CompileFailed("boom".into()));
            }

            if inputs.separate_java_and_scala {
                let uri = PickleUri::new(format!("pickle://{name}"));
                inputs.pickle_ready.complete(PickleOutcome::Ready(uri));
            } else {
                inputs.pickle_ready.complete(PickleOutcome::Unavailable);
            }
            inputs.complete_java.complete(JavaCompletion::Ready);
            CompileResult::Ok
        })
    })
}

fn project(name: &str) -> Project {
    Project::new(name, Platform::Jvm).with_sources([PathBuf::from(format!("{name}.src"))])
}

/// A -> B -> C ("depends on"): A is the root, C has no dependencies.
fn linear_chain() -> Arc<Dag> {
    let c = Dag::leaf(project("c"));
    let b = Dag::parent(project("b"), vec![c]);
    Dag::parent(project("a"), vec![b])
}

/// A -> B, A -> C, D -> B, D -> C: B and C are shared dependencies of both
/// A and D.
fn diamond() -> (Arc<Dag>, Arc<Dag>) {
    let b = Dag::leaf(project("b"));
    let c = Dag::leaf(project("c"));
    let a = Dag::parent(project("a"), vec![Arc::clone(&b), Arc::clone(&c)]);
    let d = Dag::parent(project("d"), vec![b, c]);
    (a, d)
}

#[tokio::test(flavor = "multi_thread")]
async fn linear_chain_compiles_each_node_once_and_orders_the_picklepath() {
    let root = linear_chain();
    let harness = Harness::default();
    let options = SchedulerBuilder::new()
        .pipeline(true)
        .setup(fake_setup())
        .compile(fake_compile(harness.clone(), &[]))
        .build()
        .unwrap();

    let state = compile(&root, &options, &mut no_previous_results(), Default::default()).await.unwrap();

    assert_eq!(harness.count("a"), 1);
    assert_eq!(harness.count("b"), 1);
    assert_eq!(harness.count("c"), 1);
    assert_eq!(harness.picklepath("c"), Vec::<String>::new());
    assert_eq!(harness.picklepath("b"), vec!["pickle://c"]);
    assert_eq!(harness.picklepath("a"), vec!["pickle://b", "pickle://c"]);
    assert_eq!(state.status, ExitStatus::Ok);
}

#[tokio::test(flavor = "multi_thread")]
async fn diamond_compiles_shared_dependencies_exactly_once() {
    let (a, d) = diamond();
    let harness = Harness::default();
    let options = SchedulerBuilder::new()
        .pipeline(true)
        .setup(fake_setup())
        .compile(fake_compile(harness.clone(), &[]))
        .build()
        .unwrap();

    let state_a = compile(&a, &options, &mut no_previous_results(), Default::default()).await.unwrap();
    let state_d = compile(&d, &options, &mut no_previous_results(), Default::default()).await.unwrap();

    // b and c are each reached from two different root invocations of
    // `compile`, but within one traversal (one call) each is scheduled once;
    // across two separate traversals here the walker has no shared memo, so
    // we instead assert the single-traversal property directly.
    assert_eq!(state_a.status, ExitStatus::Ok);
    assert_eq!(state_d.status, ExitStatus::Ok);

    let mut picklepath_a = harness.picklepath("a");
    picklepath_a.sort();
    assert_eq!(picklepath_a, vec!["pickle://b", "pickle://c"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn diamond_within_a_single_traversal_schedules_each_node_once() {
    use pickle_sched::{DagWalker, WalkContext};

    let (a, d) = diamond();
    let harness = Harness::default();
    let ctx = Arc::new(WalkContext::new(
        fake_setup(),
        fake_compile(harness.clone(), &[]),
        Arc::new(pickle_sched::NoopReporter),
        true,
        Default::default(),
    ));
    let walker = DagWalker::new(ctx);

    let handle_a = walker.traverse(&a);
    let handle_d = walker.traverse(&d);

    let _ = handle_a.finished.wait().await.unwrap();
    let _ = handle_d.finished.wait().await.unwrap();

    assert_eq!(harness.count("b"), 1);
    assert_eq!(harness.count("c"), 1);
    assert_eq!(harness.count("a"), 1);
    assert_eq!(harness.count("d"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn leaf_failure_blocks_its_only_dependent() {
    let c = Dag::leaf(project("c"));
    let b = Dag::parent(project("b"), vec![c]);

    let harness = Harness::default();
    let options = SchedulerBuilder::new()
        .pipeline(true)
        .setup(fake_setup())
        .compile(fake_compile(harness.clone(), &["c"]))
        .build()
        .unwrap();

    let state = compile(&b, &options, &mut no_previous_results(), Default::default()).await.unwrap();

    assert_eq!(state.status, ExitStatus::Failed);
    assert_eq!(harness.count("c"), 1);
    assert_eq!(harness.count("b"), 0, "b must never be handed to compile once c fails");

    let b_result = state.results.iter().find(|r| r.project.as_str() == "b").unwrap();
    match &b_result.result {
        CompileResult::NotOk(FailedCause::Blocked(names)) => {
            assert_eq!(names.iter().map(|n| n.as_str()).collect::<Vec<_>>(), vec!["c"]);
        }
        other => panic!("expected b to be Blocked([\"c\"]), got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn non_pipelined_mode_compiles_with_an_empty_picklepath() {
    let c = Dag::leaf(project("c"));
    let b = Dag::parent(project("b"), vec![c]);

    let harness = Harness::default();
    let options = SchedulerBuilder::new()
        .pipeline(false)
        .setup(fake_setup())
        .compile(fake_compile(harness.clone(), &[]))
        .build()
        .unwrap();

    let state = compile(&b, &options, &mut no_previous_results(), Default::default()).await.unwrap();

    assert_eq!(state.status, ExitStatus::Ok);
    assert_eq!(harness.picklepath("b"), Vec::<String>::new());
}

#[tokio::test(flavor = "multi_thread")]
async fn aggregate_with_mixed_outcomes_blocks_its_parent() {
    let x = Dag::leaf(project("x"));
    let y = Dag::leaf(project("y"));
    let group = Dag::aggregate(vec![x, y]);
    let parent = Dag::parent(project("p"), vec![group]);

    let harness = Harness::default();
    let options = SchedulerBuilder::new()
        .pipeline(true)
        .setup(fake_setup())
        .compile(fake_compile(harness.clone(), &["y"]))
        .build()
        .unwrap();

    let state = compile(&parent, &options, &mut no_previous_results(), Default::default()).await.unwrap();

    assert_eq!(state.status, ExitStatus::Failed);
    assert_eq!(harness.count("p"), 0, "p must never compile once y in its aggregate fails");

    let p_result = state.results.iter().find(|r| r.project.as_str() == "p").unwrap();
    match &p_result.result {
        CompileResult::NotOk(FailedCause::Blocked(names)) => {
            assert_eq!(names.iter().map(|n| n.as_str()).collect::<Vec<_>>(), vec!["y"]);
        }
        other => panic!("expected p to be Blocked([\"y\"]), got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn oracle_exposes_an_upstreams_own_java_completion() {
    let mut a = project("a");
    a.java_sources.push(PathBuf::from("A.java"));
    let a = Dag::leaf(a);
    let b = Dag::parent(project("b"), vec![a]);

    let observed = Arc::new(Mutex::new(None));
    let observed_clone = Arc::clone(&observed);

    let setup = fake_setup();
    let compile: pickle_sched::CompileFn = Arc::new(move |inputs: Inputs| {
        let observed = observed_clone.clone();
        Box::pin(async move {
            let name = inputs.bundle.project.clone();
            if name.as_str() == "b" {
                let upstream = inputs.oracle.java_complete(&"a".into()).expect("a should be in b's oracle");
                let completion = upstream.wait().await.unwrap();
                *observed.lock().unwrap() = Some(completion.is_ready());
            }
            inputs.pickle_ready.complete(PickleOutcome::Unavailable);
            inputs.complete_java.complete(JavaCompletion::Ready);
            CompileResult::Ok
        })
    });

    let options = SchedulerBuilder::new().pipeline(true).setup(setup).compile(compile).build().unwrap();
    let state = compile_project(&b, &options).await;

    assert_eq!(state.status, ExitStatus::Ok);
    assert_eq!(*observed.lock().unwrap(), Some(true));
}

async fn compile_project(
    root: &Arc<Dag>,
    options: &pickle_sched::ScheduleOptions,
) -> pickle_sched::BuildState {
    compile(root, options, &mut no_previous_results(), Default::default()).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn sequential_gate_refuses_to_schedule_when_a_dependency_previously_failed() {
    let base = Dag::leaf(project("base"));
    let dependent = Dag::parent(project("dependent"), vec![base]);

    let mut previous = HashMapPreviousResults::default();
    previous.0.insert(
        "base".into(),
        CompileResult::NotOk(FailedCause::CompileFailed("boom".into())),
    );

    let harness = Harness::default();
    let options = SchedulerBuilder::new()
        .sequential(true)
        .pipeline(true)
        .setup(fake_setup())
        .compile(fake_compile(harness.clone(), &[]))
        .build()
        .unwrap();

    let err = compile(&dependent, &options, &mut previous, Default::default()).await.unwrap_err();

    assert!(matches!(err, Error::SequentialDependencyFailed(name) if name.as_str() == "base"));
    assert_eq!(harness.count("base"), 0);
    assert_eq!(harness.count("dependent"), 0);
}
