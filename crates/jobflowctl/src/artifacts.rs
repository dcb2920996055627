//! Built-in deciders and listeners available to job files.

use async_trait::async_trait;
use jobflow_engine::{ArtifactRegistry, BatchStatus, Decider, JobListener, StepExecution};

/// Returns the `exit_status` property unchanged.
struct StaticDecider {
    exit_status: String,
}

#[async_trait]
impl Decider for StaticDecider {
    async fn decide(&self, _preceding: &[StepExecution]) -> anyhow::Result<String> {
        Ok(self.exit_status.clone())
    }
}

/// Returns the exit status of the first preceding step.
struct FirstExitStatusDecider;

#[async_trait]
impl Decider for FirstExitStatusDecider {
    async fn decide(&self, preceding: &[StepExecution]) -> anyhow::Result<String> {
        preceding
            .first()
            .map(|s| s.exit_status.clone())
            .ok_or_else(|| anyhow::anyhow!("No preceding step execution"))
    }
}

/// `COMPLETED` when every preceding step completed, `FAILED` otherwise.
struct AllCompletedDecider;

#[async_trait]
impl Decider for AllCompletedDecider {
    async fn decide(&self, preceding: &[StepExecution]) -> anyhow::Result<String> {
        let all = preceding.iter().all(|s| s.status == BatchStatus::Completed);
        let status = if all {
            BatchStatus::Completed
        } else {
            BatchStatus::Failed
        };
        Ok(status.as_str().to_string())
    }
}

/// Logs job boundaries.
struct LogListener {
    label: String,
}

#[async_trait]
impl JobListener for LogListener {
    async fn before_job(&self) -> anyhow::Result<()> {
        tracing::info!(listener = %self.label, "Before job");
        Ok(())
    }

    async fn after_job(&self) -> anyhow::Result<()> {
        tracing::info!(listener = %self.label, "After job");
        Ok(())
    }
}

/// Registry holding the built-in artifacts:
/// - deciders `static`, `first_exit_status`, `all_completed`
/// - listener `log`
pub fn builtin_registry() -> ArtifactRegistry {
    let mut registry = ArtifactRegistry::new();

    registry.register_decider("static", |props| {
        let exit_status = props
            .get("exit_status")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("static decider requires an 'exit_status' property"))?;
        Ok(Box::new(StaticDecider { exit_status }) as Box<dyn Decider>)
    });
    registry.register_decider("first_exit_status", |_| {
        Ok(Box::new(FirstExitStatusDecider) as Box<dyn Decider>)
    });
    registry.register_decider("all_completed", |_| {
        Ok(Box::new(AllCompletedDecider) as Box<dyn Decider>)
    });
    registry.register_listener("log", |props| {
        let label = props.get("label").cloned().unwrap_or_else(|| "log".to_string());
        Ok(Box::new(LogListener { label }) as Box<dyn JobListener>)
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobflow_engine::{ArtifactFactory, ArtifactRef};

    fn step(status: BatchStatus, exit: &str) -> StepExecution {
        StepExecution::new("s", status, exit)
    }

    #[tokio::test]
    async fn test_static_decider() {
        let registry = builtin_registry();
        let decider = registry
            .create_decider(&ArtifactRef::new("static").with_property("exit_status", "GO"))
            .unwrap();
        assert_eq!(decider.decide(&[]).await.unwrap(), "GO");

        assert!(registry.create_decider(&ArtifactRef::new("static")).is_err());
    }

    #[tokio::test]
    async fn test_all_completed_decider() {
        let registry = builtin_registry();
        let decider = registry
            .create_decider(&ArtifactRef::new("all_completed"))
            .unwrap();
        let ok = vec![step(BatchStatus::Completed, "A"), step(BatchStatus::Completed, "B")];
        assert_eq!(decider.decide(&ok).await.unwrap(), "COMPLETED");

        let mixed = vec![step(BatchStatus::Completed, "A"), step(BatchStatus::Failed, "B")];
        assert_eq!(decider.decide(&mixed).await.unwrap(), "FAILED");
    }

    #[tokio::test]
    async fn test_first_exit_status_decider() {
        let registry = builtin_registry();
        let decider = registry
            .create_decider(&ArtifactRef::new("first_exit_status"))
            .unwrap();
        assert_eq!(
            decider.decide(&[step(BatchStatus::Completed, "LEFT")]).await.unwrap(),
            "LEFT"
        );
        assert!(decider.decide(&[]).await.is_err());
    }

    #[test]
    fn test_builtin_names() {
        let registry = builtin_registry();
        assert_eq!(
            registry.list(),
            vec!["all_completed", "first_exit_status", "static", "log"]
        );
    }
}
