//! Jobflow batch engine.
//!
//! Executes declarative batch jobs made of steps, decisions, sequential
//! flows, and parallel splits. Status and exit status propagate through a
//! transition graph; stopped and failed runs restart from a saved position.
//!
//! # Architecture
//!
//! - [`model`]: the immutable job graph
//! - [`transition`]: exit-status to disposition resolution
//! - [`context`]: per-scope runtime state and ancestor chains
//! - [`runner`]: job, composite, flow, and split runners behind [`JobEngine`]
//! - [`artifact`], [`repository`], [`step`]: collaborator boundaries

pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod model;
pub mod properties;
pub mod repository;
pub mod runner;
pub mod status;
pub mod step;
pub mod transition;

pub use artifact::{ArtifactFactory, ArtifactRegistry, Decider, JobListener, ScopedArtifact};
pub use config::{EngineConfig, SplitTimeoutPolicy};
pub use context::{ExecutionContext, Scope, StepContext};
pub use error::{EngineError, EngineResult};
pub use execution::{FlowExecution, JobExecution, JobExecutionSnapshot, StepExecution};
pub use model::{ArtifactRef, Decision, Flow, Job, JobElement, Split, Step, TransitionRule};
pub use properties::{properties_to_string, string_to_properties, Properties};
pub use repository::{InMemoryJobRepository, JobRepository};
pub use runner::{JobEngine, JobEngineBuilder};
pub use status::{BatchStatus, StatusCell};
pub use step::{ScriptedStepRunner, StepOutcome, StepRunner, StepStatus};
pub use transition::Resolution;
