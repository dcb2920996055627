//! Execution runners.
//!
//! [`JobEngine`] is the entry point. Internally a job run is a tree of
//! runners:
//! - the job runner drives listeners, dispatch, and finalization
//! - the composite runner walks one container's elements by transition
//! - the flow runner runs a nested flow or a split branch
//! - the split runner fans out branches and joins them under a bound

mod composite;
mod flow;
mod job;
mod split;


use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::artifact::{ArtifactFactory, ArtifactRegistry};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::execution::JobExecution;
use crate::model::{Flow, Job, JobElement};
use crate::properties::Properties;
use crate::repository::{InMemoryJobRepository, JobRepository};
use crate::status::BatchStatus;
use crate::step::{ScriptedStepRunner, StepRunner};

use job::JobRunner;

/// Element container a composite runner walks.
#[derive(Debug, Clone)]
pub(crate) enum Container {
    Job(Arc<Job>),
    Flow(Arc<Flow>),
}

impl Container {
    pub(crate) fn id(&self) -> &str {
        match self {
            Self::Job(job) => &job.id,
            Self::Flow(flow) => &flow.id,
        }
    }

    pub(crate) fn elements(&self) -> &[JobElement] {
        match self {
            Self::Job(job) => &job.elements,
            Self::Flow(flow) => &flow.elements,
        }
    }
}

/// Collaborators shared by every runner of a job run.
pub(crate) struct RuntimeEnv {
    pub(crate) step_runner: Arc<dyn StepRunner>,
    pub(crate) artifacts: Arc<dyn ArtifactFactory>,
    pub(crate) repository: Arc<dyn JobRepository>,
    pub(crate) config: EngineConfig,
    /// Bounds concurrently running steps; `None` when unbounded.
    pub(crate) step_permits: Option<Arc<Semaphore>>,
}

/// Runs jobs against a step runner, an artifact factory, and a repository.
#[derive(Clone)]
pub struct JobEngine {
    env: Arc<RuntimeEnv>,
}

impl JobEngine {
    pub fn builder() -> JobEngineBuilder {
        JobEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.env.config
    }

    /// Validate `job` and run a new execution of it.
    pub async fn start(&self, job: &Job, parameters: Properties) -> EngineResult<Arc<JobExecution>> {
        job.validate()?;
        let execution = Arc::new(JobExecution::new(job.id.clone(), parameters));
        self.run(job, execution.clone()).await;
        Ok(execution)
    }

    /// Run a new execution that resumes where `prior` left off.
    ///
    /// Only STOPPED and FAILED executions can be restarted.
    pub async fn restart(&self, job: &Job, prior: &JobExecution) -> EngineResult<Arc<JobExecution>> {
        match prior.status() {
            BatchStatus::Stopped | BatchStatus::Failed => {}
            status => {
                return Err(EngineError::Validation(format!(
                    "Execution {} is {} and cannot be restarted",
                    prior.id(),
                    status
                )));
            }
        }
        if prior.job_name() != job.id {
            return Err(EngineError::Validation(format!(
                "Execution {} belongs to job '{}', not '{}'",
                prior.id(),
                prior.job_name(),
                job.id
            )));
        }
        job.validate()?;

        let execution = Arc::new(JobExecution::restart_of(prior));
        self.run(job, execution.clone()).await;
        Ok(execution)
    }

    /// Run `execution` to a terminal status. The job is not validated.
    pub async fn run(&self, job: &Job, execution: Arc<JobExecution>) -> BatchStatus {
        JobRunner::new(Arc::new(job.clone()), execution, self.env.clone())
            .run()
            .await
    }
}

impl std::fmt::Debug for JobEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEngine")
            .field("config", &self.env.config)
            .finish()
    }
}

/// Builder for [`JobEngine`].
///
/// Unset collaborators default to [`ScriptedStepRunner`], an empty
/// [`ArtifactRegistry`], and an [`InMemoryJobRepository`].
#[derive(Default)]
pub struct JobEngineBuilder {
    step_runner: Option<Arc<dyn StepRunner>>,
    artifacts: Option<Arc<dyn ArtifactFactory>>,
    repository: Option<Arc<dyn JobRepository>>,
    config: EngineConfig,
}

impl JobEngineBuilder {
    pub fn step_runner(mut self, step_runner: Arc<dyn StepRunner>) -> Self {
        self.step_runner = Some(step_runner);
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactFactory>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn JobRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> JobEngine {
        let step_permits = match self.config.max_concurrent_steps {
            0 => None,
            max => Some(Arc::new(Semaphore::new(max))),
        };
        JobEngine {
            env: Arc::new(RuntimeEnv {
                step_runner: self
                    .step_runner
                    .unwrap_or_else(|| Arc::new(ScriptedStepRunner::new())),
                artifacts: self
                    .artifacts
                    .unwrap_or_else(|| Arc::new(ArtifactRegistry::new())),
                repository: self
                    .repository
                    .unwrap_or_else(|| Arc::new(InMemoryJobRepository::new())),
                config: self.config,
                step_permits,
            }),
        }
    }
}
