//! Job runner: lifecycle around element dispatch.

use std::sync::Arc;

use super::composite::CompositeRunner;
use super::{Container, RuntimeEnv};
use crate::artifact::{JobListener, ScopedArtifact};
use crate::context::ExecutionContext;
use crate::error::{EngineError, EngineResult};
use crate::execution::JobExecution;
use crate::model::Job;
use crate::status::BatchStatus;

pub(crate) struct JobRunner {
    job: Arc<Job>,
    execution: Arc<JobExecution>,
    env: Arc<RuntimeEnv>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Before,
    After,
}

impl JobRunner {
    pub(crate) fn new(job: Arc<Job>, execution: Arc<JobExecution>, env: Arc<RuntimeEnv>) -> Self {
        Self {
            job,
            execution,
            env,
        }
    }

    /// Drive the execution to a terminal status and return it.
    pub(crate) async fn run(self) -> BatchStatus {
        let ctx = ExecutionContext::job(self.job.id.clone(), self.execution.clone());

        if ctx.transition(BatchStatus::Starting, BatchStatus::Started) {
            self.execution.mark_started();
            tracing::info!(
                job = %self.job.id,
                execution_id = %self.execution.id(),
                restart = ?self.execution.restart_position(),
                "Job started"
            );
            self.update(false).await;
        } else {
            tracing::info!(
                job = %self.job.id,
                execution_id = %self.execution.id(),
                status = %ctx.status(),
                "Job not started"
            );
        }

        let listeners = match self.create_listeners() {
            Ok(listeners) => listeners,
            Err(e) => {
                tracing::error!(job = %self.job.id, error = %e, "Failed to create job listeners");
                ctx.fail();
                Vec::new()
            }
        };

        self.invoke_listeners(&listeners, Phase::Before, &ctx).await;

        if ctx.status() == BatchStatus::Started {
            self.dispatch(&ctx).await;
        }

        self.invoke_listeners(&listeners, Phase::After, &ctx).await;
        drop(listeners);

        self.finalize(&ctx).await
    }

    /// Run the job's elements on their own task; a panic there fails the job.
    async fn dispatch(&self, ctx: &Arc<ExecutionContext>) {
        let restart = self.execution.take_restart_position();
        let mut runner = CompositeRunner::new(
            Container::Job(self.job.clone()),
            ctx.clone(),
            self.env.clone(),
        );

        let joined =
            tokio::spawn(async move { runner.run_from_head_or_restart_point(restart).await })
                .await;
        let err = match joined {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(e) => EngineError::Orchestration(format!("Element dispatch aborted: {}", e)),
        };
        tracing::error!(
            job = %self.job.id,
            execution_id = %self.execution.id(),
            error = %err,
            configuration = err.is_configuration(),
            "Job element execution failed"
        );
        ctx.fail();
    }

    fn create_listeners(&self) -> EngineResult<Vec<ScopedArtifact<dyn JobListener>>> {
        self.job
            .listeners
            .iter()
            .map(|artifact| ScopedArtifact::job_listener(&self.env.artifacts, artifact))
            .collect()
    }

    /// Call one hook on every listener in order. The first failure fails the
    /// job and skips the rest of the phase.
    async fn invoke_listeners(
        &self,
        listeners: &[ScopedArtifact<dyn JobListener>],
        phase: Phase,
        ctx: &ExecutionContext,
    ) {
        for listener in listeners {
            let result = match phase {
                Phase::Before => listener.before_job().await,
                Phase::After => listener.after_job().await,
            };
            if let Err(e) = result {
                let err = EngineError::Listener {
                    listener: listener.name().to_string(),
                    message: format!("{:#}", e),
                };
                tracing::error!(
                    job = %self.job.id,
                    execution_id = %self.execution.id(),
                    phase = ?phase,
                    error = %err,
                    "Job listener failed"
                );
                ctx.fail();
                break;
            }
        }
    }

    async fn finalize(&self, ctx: &ExecutionContext) -> BatchStatus {
        ctx.transition(BatchStatus::Started, BatchStatus::Completed);
        ctx.transition(BatchStatus::Stopping, BatchStatus::Stopped);

        let status = ctx.status();
        self.execution.set_exit_status(ctx.effective_exit_status());
        self.execution.mark_ended();
        self.update(true).await;
        self.execution.cleanup();

        tracing::info!(
            job = %self.job.id,
            execution_id = %self.execution.id(),
            status = %status,
            exit_status = ?self.execution.exit_status(),
            restart = ?self.execution.restart_position(),
            "Job finished"
        );
        status
    }

    async fn update(&self, terminal: bool) {
        if let Err(e) = self
            .env
            .repository
            .update_job_execution(&self.execution, terminal)
            .await
        {
            tracing::error!(
                job = %self.job.id,
                execution_id = %self.execution.id(),
                terminal,
                error = %e,
                "Failed to record job execution"
            );
        }
    }
}
