//! Job repository boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::execution::{JobExecution, JobExecutionSnapshot};

/// Sink for execution record updates.
///
/// Called when a run starts (`terminal == false`) and once more when it
/// ends (`terminal == true`).
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn update_job_execution(&self, execution: &JobExecution, terminal: bool)
        -> EngineResult<()>;
}

/// Repository keeping every update in memory.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    executions: RwLock<HashMap<Uuid, Vec<JobExecutionSnapshot>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded snapshots of an execution, oldest first.
    pub async fn history(&self, execution_id: Uuid) -> Vec<JobExecutionSnapshot> {
        let executions = self.executions.read().await;
        executions.get(&execution_id).cloned().unwrap_or_default()
    }

    /// Most recent snapshot of an execution.
    pub async fn latest(&self, execution_id: Uuid) -> Option<JobExecutionSnapshot> {
        let executions = self.executions.read().await;
        executions
            .get(&execution_id)
            .and_then(|history| history.last().cloned())
    }

    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn update_job_execution(
        &self,
        execution: &JobExecution,
        terminal: bool,
    ) -> EngineResult<()> {
        let snapshot = execution.snapshot();
        tracing::debug!(
            execution_id = %snapshot.execution_id,
            status = %snapshot.status,
            terminal,
            "Recording job execution"
        );
        let mut executions = self.executions.write().await;
        executions
            .entry(snapshot.execution_id)
            .or_default()
            .push(snapshot);
        Ok(())
    }
}
