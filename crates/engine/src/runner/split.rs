//! Split runner: concurrent flows joined under a bound.

use std::sync::Arc;

use tokio::task::JoinSet;

use super::flow::FlowRunner;
use super::RuntimeEnv;
use crate::config::SplitTimeoutPolicy;
use crate::context::ExecutionContext;
use crate::error::{EngineError, EngineResult};
use crate::execution::{FlowExecution, StepExecution};
use crate::model::Split;
use crate::status::BatchStatus;

type Branches = JoinSet<(usize, FlowExecution)>;

pub(crate) struct SplitRunner {
    split: Split,
    ctx: Arc<ExecutionContext>,
    env: Arc<RuntimeEnv>,
}

impl SplitRunner {
    pub(crate) fn new(split: Split, ctx: Arc<ExecutionContext>, env: Arc<RuntimeEnv>) -> Self {
        Self { split, ctx, env }
    }

    /// Run every flow concurrently and fold their outcomes into the split.
    ///
    /// Returns the last step execution of each branch when the split
    /// completed, `None` otherwise.
    pub(crate) async fn run(self) -> Option<Vec<StepExecution>> {
        self.ctx.set_status(BatchStatus::Started);
        tracing::info!(
            execution_id = %self.ctx.job_execution().id(),
            split = %self.split.id,
            branches = self.split.flows.len(),
            "Starting split"
        );

        let mut branches = Branches::new();
        for (index, flow) in self.split.flows.iter().enumerate() {
            let branch_ctx = ExecutionContext::branch(&self.ctx, flow.id.clone());
            let runner = FlowRunner::new(Arc::new(flow.clone()), branch_ctx, self.env.clone());
            branches.spawn(async move { (index, runner.run().await) });
        }

        let joined = match self.env.config.split_timeout() {
            Some(bound) => {
                match tokio::time::timeout(bound, join_branches(&mut branches, self.split.flows.len())).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        self.release_stragglers(&mut branches);
                        Err(EngineError::SplitTimeout {
                            split: self.split.id.clone(),
                            millis: bound.as_millis() as u64,
                        })
                    }
                }
            }
            None => join_branches(&mut branches, self.split.flows.len()).await,
        };

        let flows = match joined {
            Ok(flows) => flows,
            Err(e) => {
                tracing::error!(
                    execution_id = %self.ctx.job_execution().id(),
                    split = %self.split.id,
                    error = %e,
                    "Split failed"
                );
                self.ctx.fail();
                return None;
            }
        };

        self.aggregate(flows)
    }

    fn aggregate(&self, flows: Vec<FlowExecution>) -> Option<Vec<StepExecution>> {
        if let Some(failed) = flows.iter().find(|f| f.status == BatchStatus::Failed) {
            tracing::warn!(
                split = %self.split.id,
                flow = %failed.flow_id,
                "Branch failed, failing split"
            );
            self.ctx.fail();
            return None;
        }

        if flows.iter().any(|f| f.status != BatchStatus::Completed) {
            let execution = self.ctx.job_execution();
            if execution.restart_position().is_none() && !self.ctx.is_released() {
                let position = self
                    .ctx
                    .root_element()
                    .unwrap_or(&self.split.id)
                    .to_string();
                execution.set_restart_position(Some(position));
            }
            tracing::info!(split = %self.split.id, "Branch stopped, stopping split");
            self.ctx.stop();
            return None;
        }

        self.ctx.transition(BatchStatus::Started, BatchStatus::Completed);
        tracing::info!(split = %self.split.id, status = %self.ctx.status(), "Split finished");
        Some(
            flows
                .into_iter()
                .filter_map(|f| f.last_step_execution)
                .collect(),
        )
    }

    /// Give up on the outstanding branches. Whatever they still finish is
    /// kept off the execution record under either policy.
    fn release_stragglers(&self, branches: &mut Branches) {
        self.ctx.release_branches();
        match self.env.config.split_timeout_policy {
            SplitTimeoutPolicy::Cancel => {
                tracing::warn!(split = %self.split.id, outstanding = branches.len(), "Cancelling branches");
                branches.abort_all();
            }
            SplitTimeoutPolicy::Detach => {
                tracing::warn!(split = %self.split.id, outstanding = branches.len(), "Detaching branches");
                branches.detach_all();
            }
        }
    }
}

/// Wait for every branch; results come back in declaration order.
async fn join_branches(branches: &mut Branches, count: usize) -> EngineResult<Vec<FlowExecution>> {
    let mut results: Vec<Option<FlowExecution>> = vec![None; count];
    while let Some(joined) = branches.join_next().await {
        let (index, flow) =
            joined.map_err(|e| EngineError::Orchestration(format!("Branch task failed: {}", e)))?;
        results[index] = Some(flow);
    }
    Ok(results.into_iter().flatten().collect())
}
