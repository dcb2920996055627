//! Flow runner.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::composite::CompositeRunner;
use super::{Container, RuntimeEnv};
use crate::context::ExecutionContext;
use crate::execution::FlowExecution;
use crate::model::Flow;
use crate::status::BatchStatus;

/// Runs one flow, standalone or as a split branch.
pub(crate) struct FlowRunner {
    flow: Arc<Flow>,
    ctx: Arc<ExecutionContext>,
    env: Arc<RuntimeEnv>,
}

impl FlowRunner {
    pub(crate) fn new(flow: Arc<Flow>, ctx: Arc<ExecutionContext>, env: Arc<RuntimeEnv>) -> Self {
        Self { flow, ctx, env }
    }

    /// Run the flow to a terminal status.
    ///
    /// Boxed because flows nest: a flow can hold a split whose branches are
    /// flows again.
    pub(crate) fn run(self) -> BoxFuture<'static, FlowExecution> {
        Box::pin(async move {
            self.ctx.transition(BatchStatus::Starting, BatchStatus::Started);

            let mut runner = CompositeRunner::new(
                Container::Flow(self.flow.clone()),
                self.ctx.clone(),
                self.env.clone(),
            );
            if let Err(e) = runner.run_from_head_or_restart_point(None).await {
                tracing::error!(
                    execution_id = %self.ctx.job_execution().id(),
                    flow = %self.flow.id,
                    error = %e,
                    "Flow failed"
                );
                self.ctx.fail();
            }
            self.ctx.transition(BatchStatus::Started, BatchStatus::Completed);

            let status = self.ctx.status();
            tracing::debug!(flow = %self.flow.id, status = %status, "Flow finished");
            FlowExecution {
                flow_id: self.flow.id.clone(),
                status,
                exit_status: self.ctx.exit_status(),
                last_step_execution: runner.last_step_execution(),
            }
        })
    }
}
