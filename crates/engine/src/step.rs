//! Step runner boundary.
//!
//! The engine treats a step as one opaque operation with three outcomes.
//! Reading, processing, and writing items is the runner's business.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::StepContext;
use crate::model::Step;
use crate::status::BatchStatus;

/// Terminal outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Stopped,
}

impl StepStatus {
    pub fn batch_status(&self) -> BatchStatus {
        match self {
            Self::Completed => BatchStatus::Completed,
            Self::Failed => BatchStatus::Failed,
            Self::Stopped => BatchStatus::Stopped,
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" | "complete" => Ok(Self::Completed),
            "failed" | "fail" => Ok(Self::Failed),
            "stopped" | "stop" => Ok(Self::Stopped),
            other => Err(format!("unknown step outcome: {}", other)),
        }
    }
}

/// What a step runner reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<String>,
}

impl StepOutcome {
    pub fn completed() -> Self {
        Self {
            status: StepStatus::Completed,
            exit_status: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: StepStatus::Failed,
            exit_status: None,
        }
    }

    pub fn stopped() -> Self {
        Self {
            status: StepStatus::Stopped,
            exit_status: None,
        }
    }

    pub fn with_exit_status(mut self, exit_status: impl Into<String>) -> Self {
        self.exit_status = Some(exit_status.into());
        self
    }
}

/// Runs one step to completion.
///
/// An `Err` is treated as a FAILED step; the error is logged.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, step: &Step, ctx: &StepContext) -> anyhow::Result<StepOutcome>;
}

/// Step runner driven entirely by step properties.
///
/// - `outcome`: `completed` (default), `failed`, or `stopped`
/// - `exit_status`: exit status to report
/// - `sleep_ms`: simulated work before reporting
#[derive(Debug, Clone, Default)]
pub struct ScriptedStepRunner;

impl ScriptedStepRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepRunner for ScriptedStepRunner {
    async fn run(&self, step: &Step, ctx: &StepContext) -> anyhow::Result<StepOutcome> {
        if let Some(sleep_ms) = step.properties.get("sleep_ms") {
            let millis: u64 = sleep_ms
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid sleep_ms '{}': {}", sleep_ms, e))?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let status = match step.properties.get("outcome") {
            Some(outcome) => outcome.parse::<StepStatus>().map_err(anyhow::Error::msg)?,
            None => StepStatus::Completed,
        };

        tracing::debug!(
            execution_id = %ctx.execution_id(),
            step = %step.id,
            outcome = ?status,
            "Scripted step finished"
        );

        Ok(StepOutcome {
            status,
            exit_status: step.properties.get("exit_status").cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionContext, Scope};
    use crate::execution::JobExecution;
    use crate::properties::Properties;
    use std::sync::Arc;

    fn step_ctx(step: &Step) -> StepContext {
        let execution = Arc::new(JobExecution::new("payroll", Properties::new()));
        let job = ExecutionContext::job("payroll", execution);
        StepContext::new(ExecutionContext::child(&job, Scope::Step, step.id.clone()))
    }

    #[tokio::test]
    async fn test_scripted_defaults_to_completed() {
        let step = Step::new("a");
        let outcome = ScriptedStepRunner::new().run(&step, &step_ctx(&step)).await.unwrap();
        assert_eq!(outcome, StepOutcome::completed());
    }

    #[tokio::test]
    async fn test_scripted_reads_properties() {
        let step = Step::new("a")
            .with_property("outcome", "failed")
            .with_property("exit_status", "DISK_FULL");
        let outcome = ScriptedStepRunner::new().run(&step, &step_ctx(&step)).await.unwrap();
        assert_eq!(outcome, StepOutcome::failed().with_exit_status("DISK_FULL"));
    }

    #[tokio::test]
    async fn test_scripted_rejects_bad_outcome() {
        let step = Step::new("a").with_property("outcome", "maybe");
        let result = ScriptedStepRunner::new().run(&step, &step_ctx(&step)).await;
        assert!(result.unwrap_err().to_string().contains("maybe"));
    }

    #[test]
    fn test_step_status_maps_to_batch_status() {
        assert_eq!(StepStatus::Stopped.batch_status(), BatchStatus::Stopped);
        assert_eq!("COMPLETED".parse::<StepStatus>(), Ok(StepStatus::Completed));
    }
}
