#![doc = include_str!("../README.md")]
#![warn(rustdoc::all)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod error;
pub use error::{Error, Result};

pub mod ids;
pub use ids::{PickleUri, ProjectId};

pub mod bundle;
pub use bundle::{CompileBundle, CompilerInstance, EarlyResult, Platform, Project, SetupFn};

pub mod dag;
pub use dag::{Dag, NodeKey};

pub mod promise;
pub use promise::{promise, PromiseError, PromiseReader, PromiseWriter};

pub mod javasignal;
pub use javasignal::{JavaCompletion, JavaSignal};

pub mod result;
pub use result::{CompileResult, FailedCause, FinalCompileResult, PickleOutcome};

pub mod partial;
pub use partial::{BlockingCause, PartialCompileResult};

pub mod inputs;
pub use inputs::{CompileFn, CompilerOracle, Inputs};

pub mod pipeline;

pub mod walker;
pub use walker::{DagWalker, NodeHandle, WalkContext};

pub mod collector;
pub use collector::{ExitStatus, HashMapPreviousResults, JsonPreviousResults, PreviousResults, ResultCollector};

pub mod report;
pub use report::{init_default_tracing, NoopReporter, Reporter, TracingReporter};

pub mod scheduler;
pub use scheduler::{compile, no_previous_results, BuildState, ScheduleOptions, SchedulerBuilder, UserMode};

#[cfg(feature = "project-util")]
pub mod project_util;
