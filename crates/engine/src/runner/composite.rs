//! Element dispatch within one container.

use std::sync::Arc;

use chrono::Utc;

use super::flow::FlowRunner;
use super::split::SplitRunner;
use super::{Container, RuntimeEnv};
use crate::artifact::ScopedArtifact;
use crate::context::{ExecutionContext, Scope, StepContext};
use crate::error::{EngineError, EngineResult};
use crate::execution::StepExecution;
use crate::model::{Decision, Flow, JobElement, Split, Step};
use crate::status::BatchStatus;
use crate::step::{StepOutcome, StepStatus};
use crate::transition::{self, Resolution};

/// Runs the elements of a job or flow one at a time, following transitions.
pub(crate) struct CompositeRunner {
    container: Container,
    ctx: Arc<ExecutionContext>,
    env: Arc<RuntimeEnv>,
    /// Step results the next decision decides on.
    preceding: Vec<StepExecution>,
}

impl CompositeRunner {
    pub(crate) fn new(container: Container, ctx: Arc<ExecutionContext>, env: Arc<RuntimeEnv>) -> Self {
        Self {
            container,
            ctx,
            env,
            preceding: Vec::new(),
        }
    }

    /// Last step execution this container produced.
    pub(crate) fn last_step_execution(&self) -> Option<StepExecution> {
        self.preceding.last().cloned()
    }

    /// Run from `restart` when given, otherwise from the first runnable element.
    pub(crate) async fn run_from_head_or_restart_point(
        &mut self,
        restart: Option<String>,
    ) -> EngineResult<()> {
        let first = match restart {
            Some(position) => {
                self.index_of(&position)?;
                tracing::info!(
                    container = %self.container.id(),
                    element = %position,
                    "Restarting from saved position"
                );
                position
            }
            None => self.head()?,
        };
        self.run_job_element(first).await
    }

    /// Run `name` and everything its transitions lead to.
    async fn run_job_element(&mut self, name: String) -> EngineResult<()> {
        let container = self.container.clone();
        let mut next = Some(name);

        while let Some(name) = next {
            if self.ctx.is_released() {
                tracing::debug!(
                    container = %container.id(),
                    element = %name,
                    "Split released branch, not running element"
                );
                return Ok(());
            }
            if self.ctx.stop_requested() {
                let position = self.restart_position_for(&name);
                tracing::info!(
                    container = %container.id(),
                    element = %name,
                    restart = %position,
                    "Stop requested, not running element"
                );
                self.record_restart_position(position);
                self.ctx.set_status(BatchStatus::Stopping);
                return Ok(());
            }
            if self.ctx.status().is_terminal() {
                return Ok(());
            }

            let index = self.index_of(&name)?;
            let element = &container.elements()[index];
            tracing::debug!(
                container = %container.id(),
                element = %name,
                kind = element.kind(),
                "Running job element"
            );

            next = match element {
                JobElement::Step(step) => self.run_step(element, step, index).await?,
                JobElement::Flow(flow) => self.run_flow(element, flow, index).await?,
                JobElement::Split(split) => self.run_split(element, split, index).await?,
                JobElement::Decision(decision) => self.run_decision(element, decision, index).await?,
            };
        }

        Ok(())
    }

    async fn run_step(
        &mut self,
        element: &JobElement,
        step: &Step,
        index: usize,
    ) -> EngineResult<Option<String>> {
        let step_ctx = ExecutionContext::child(&self.ctx, Scope::Step, step.id.clone());
        step_ctx.set_status(BatchStatus::Started);
        let start_time = Utc::now();

        let result = {
            let _permit = match &self.env.step_permits {
                Some(permits) => Some(permits.acquire().await.map_err(|e| {
                    EngineError::Orchestration(format!("Step pool closed: {}", e))
                })?),
                None => None,
            };
            self.env
                .step_runner
                .run(step, &StepContext::new(step_ctx.clone()))
                .await
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = EngineError::Step {
                    step: step.id.clone(),
                    message: format!("{:#}", e),
                };
                tracing::error!(
                    execution_id = %self.ctx.job_execution().id(),
                    element = %step.id,
                    error = %err,
                    "Step runner returned an error"
                );
                StepOutcome::failed()
            }
        };

        let status = outcome.status.batch_status();
        step_ctx.set_status(status);
        if let Some(exit_status) = &outcome.exit_status {
            step_ctx.set_exit_status(exit_status.clone());
        }
        let exit_status = step_ctx.effective_exit_status();

        let record = StepExecution {
            step_id: step.id.clone(),
            status,
            exit_status: exit_status.clone(),
            start_time,
            end_time: Some(Utc::now()),
        };
        self.record_step_execution(record.clone());
        self.preceding = vec![record];

        tracing::info!(
            execution_id = %self.ctx.job_execution().id(),
            element = %step.id,
            status = %status,
            exit_status = %exit_status,
            "Step finished"
        );

        match outcome.status {
            StepStatus::Completed => self.transition_from(element, index, &exit_status),
            StepStatus::Failed => match transition::explicit_match(&step.transitions, &exit_status) {
                Some(rule) => Ok(self.dispose(element.id(), Resolution::from(rule))),
                None => {
                    self.ctx.fail();
                    Ok(None)
                }
            },
            StepStatus::Stopped => {
                let position = self.restart_position_for(&step.id);
                self.record_restart_position(position);
                self.ctx.stop();
                Ok(None)
            }
        }
    }

    async fn run_flow(
        &mut self,
        element: &JobElement,
        flow: &Flow,
        index: usize,
    ) -> EngineResult<Option<String>> {
        let flow_ctx = ExecutionContext::child(&self.ctx, Scope::Flow, flow.id.clone());
        let result = FlowRunner::new(Arc::new(flow.clone()), flow_ctx, self.env.clone())
            .run()
            .await;

        if result.status != BatchStatus::Completed {
            return Ok(None);
        }

        self.preceding = result.last_step_execution.into_iter().collect();
        let exit_status = result
            .exit_status
            .unwrap_or_else(|| result.status.as_str().to_string());
        self.transition_from(element, index, &exit_status)
    }

    async fn run_split(
        &mut self,
        element: &JobElement,
        split: &Split,
        index: usize,
    ) -> EngineResult<Option<String>> {
        let split_ctx = ExecutionContext::child(&self.ctx, Scope::Split, split.id.clone());
        let preceding = SplitRunner::new(split.clone(), split_ctx.clone(), self.env.clone())
            .run()
            .await;

        match preceding {
            Some(preceding) => {
                self.preceding = preceding;
                self.transition_from(element, index, &split_ctx.effective_exit_status())
            }
            None => Ok(None),
        }
    }

    async fn run_decision(
        &mut self,
        element: &JobElement,
        decision: &Decision,
        index: usize,
    ) -> EngineResult<Option<String>> {
        let decider = ScopedArtifact::decider(&self.env.artifacts, &decision.decider)?;
        let exit_status = decider.decide(&self.preceding).await.map_err(|e| EngineError::Decider {
            decider: decision.decider.name.clone(),
            message: format!("{:#}", e),
        })?;
        drop(decider);

        tracing::info!(
            execution_id = %self.ctx.job_execution().id(),
            element = %decision.id,
            exit_status = %exit_status,
            "Decision made"
        );
        self.ctx.set_exit_status(exit_status.clone());
        self.transition_from(element, index, &exit_status)
    }

    /// Resolve the transitions of the element at `index`.
    fn transition_from(
        &self,
        element: &JobElement,
        index: usize,
        exit_status: &str,
    ) -> EngineResult<Option<String>> {
        let fallback = element
            .next()
            .map(str::to_string)
            .or_else(|| self.sibling_after(index));
        let resolution = transition::resolve(
            element.id(),
            element.transitions(),
            exit_status,
            fallback.as_deref(),
            matches!(element, JobElement::Decision(_)),
        )?;
        Ok(self.dispose(element.id(), resolution))
    }

    /// Apply a resolution. Returns the element to run next, if any.
    fn dispose(&self, element_id: &str, resolution: Resolution) -> Option<String> {
        match resolution {
            Resolution::Next(next) => Some(next),
            Resolution::End { exit_status } => {
                self.set_exit_status(exit_status);
                self.ctx.transition(BatchStatus::Started, BatchStatus::Completed);
                None
            }
            Resolution::Stop {
                exit_status,
                restart,
            } => {
                self.set_exit_status(exit_status);
                let position = restart.unwrap_or_else(|| self.restart_position_for(element_id));
                tracing::info!(
                    container = %self.container.id(),
                    element = element_id,
                    restart = %position,
                    "Stopping job"
                );
                self.record_restart_position(position);
                self.ctx.stop();
                None
            }
            Resolution::Fail { exit_status } => {
                self.set_exit_status(exit_status);
                tracing::info!(
                    container = %self.container.id(),
                    element = element_id,
                    "Failing job by transition"
                );
                self.ctx.fail();
                None
            }
        }
    }

    fn set_exit_status(&self, exit_status: Option<String>) {
        if let Some(exit_status) = exit_status {
            if let Some(job) = self.ctx.job_context() {
                job.set_exit_status(exit_status.clone());
            }
            self.ctx.set_exit_status(exit_status);
        }
    }

    /// Append a step result to the execution record, unless a split has
    /// released this branch.
    fn record_step_execution(&self, record: StepExecution) {
        if self.ctx.is_released() {
            tracing::debug!(element = %record.step_id, "Discarding result of released branch");
            return;
        }
        self.ctx.job_execution().add_step_execution(record);
    }

    fn record_restart_position(&self, position: String) {
        if self.ctx.is_released() {
            return;
        }
        self.ctx.job_execution().set_restart_position(Some(position));
    }

    /// Job-level element a restart should resume at.
    fn restart_position_for(&self, element_id: &str) -> String {
        match &self.container {
            Container::Job(_) => element_id.to_string(),
            Container::Flow(_) => self
                .ctx
                .root_element()
                .unwrap_or(element_id)
                .to_string(),
        }
    }

    fn head(&self) -> EngineResult<String> {
        for element in self.container.elements() {
            match element {
                JobElement::Decision(decision) => {
                    return Err(EngineError::DecisionFirst(decision.id.clone()));
                }
                JobElement::Step(_) | JobElement::Flow(_) | JobElement::Split(_) => {
                    return Ok(element.id().to_string());
                }
            }
        }
        Err(EngineError::Validation(format!(
            "'{}' has no runnable element",
            self.container.id()
        )))
    }

    fn index_of(&self, name: &str) -> EngineResult<usize> {
        self.container
            .elements()
            .iter()
            .position(|e| e.id() == name)
            .ok_or_else(|| EngineError::UnknownElement {
                name: name.to_string(),
                container: self.container.id().to_string(),
            })
    }

    fn sibling_after(&self, index: usize) -> Option<String> {
        self.container
            .elements()
            .get(index + 1)
            .map(|e| e.id().to_string())
    }
}
