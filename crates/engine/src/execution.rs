//! Execution records.
//!
//! A [`JobExecution`] tracks one run of a job. It is shared between the job
//! runner, every context of the run, and the repository, so its mutable
//! parts sit behind a mutex and its status in a [`StatusCell`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::properties::{properties_to_string, string_to_properties, Properties};
use crate::status::{BatchStatus, StatusCell};

/// Result of one step run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_id: String,
    pub status: BatchStatus,
    pub exit_status: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl StepExecution {
    pub fn new(step_id: impl Into<String>, status: BatchStatus, exit_status: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step_id: step_id.into(),
            status,
            exit_status: exit_status.into(),
            start_time: now,
            end_time: Some(now),
        }
    }
}

/// Result of one flow run inside a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowExecution {
    pub flow_id: String,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_step_execution: Option<StepExecution>,
}

#[derive(Debug, Default)]
struct ExecutionState {
    exit_status: Option<String>,
    restart_position: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    last_updated: Option<DateTime<Utc>>,
    step_executions: Vec<StepExecution>,
    transient: HashMap<String, serde_json::Value>,
}

/// One run of a job.
#[derive(Debug)]
pub struct JobExecution {
    id: Uuid,
    job_name: String,
    parameters: Properties,
    restarted_from: Option<Uuid>,
    status: Arc<StatusCell>,
    create_time: DateTime<Utc>,
    state: Mutex<ExecutionState>,
}

impl JobExecution {
    /// Create a fresh execution in STARTING state.
    pub fn new(job_name: impl Into<String>, parameters: Properties) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            parameters,
            restarted_from: None,
            status: Arc::new(StatusCell::new(BatchStatus::Starting)),
            create_time: Utc::now(),
            state: Mutex::new(ExecutionState::default()),
        }
    }

    /// Create the execution that restarts `prior`.
    ///
    /// The new run inherits the job name, the parameters, and the restart
    /// position the prior run left behind.
    pub fn restart_of(prior: &JobExecution) -> Self {
        let execution = Self {
            restarted_from: Some(prior.id),
            ..Self::new(prior.job_name.clone(), prior.parameters.clone())
        };
        execution.set_restart_position(prior.restart_position());
        execution
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn parameters(&self) -> &Properties {
        &self.parameters
    }

    pub fn restarted_from(&self) -> Option<Uuid> {
        self.restarted_from
    }

    pub fn status(&self) -> BatchStatus {
        self.status.get()
    }

    /// Cell shared with the job-scope context.
    pub fn status_cell(&self) -> Arc<StatusCell> {
        self.status.clone()
    }

    /// Request a stop. Only a STARTING or STARTED execution can be stopped;
    /// running scopes observe the request before their next element.
    pub fn request_stop(&self) -> bool {
        self.status
            .transition(BatchStatus::Starting, BatchStatus::Stopping)
            || self
                .status
                .transition(BatchStatus::Started, BatchStatus::Stopping)
    }

    pub fn exit_status(&self) -> Option<String> {
        self.lock().exit_status.clone()
    }

    pub fn set_exit_status(&self, exit_status: impl Into<String>) {
        self.lock().exit_status = Some(exit_status.into());
    }

    pub fn restart_position(&self) -> Option<String> {
        self.lock().restart_position.clone()
    }

    pub fn set_restart_position(&self, position: Option<String>) {
        self.lock().restart_position = position;
    }

    /// Consume the restart position, leaving none behind.
    pub fn take_restart_position(&self) -> Option<String> {
        self.lock().restart_position.take()
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.lock().start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.lock().end_time
    }

    pub(crate) fn mark_started(&self) {
        let now = Utc::now();
        let mut state = self.lock();
        state.start_time = Some(now);
        state.last_updated = Some(now);
    }

    pub(crate) fn mark_ended(&self) {
        let now = Utc::now();
        let mut state = self.lock();
        state.end_time = Some(now);
        state.last_updated = Some(now);
    }

    pub fn add_step_execution(&self, step_execution: StepExecution) {
        let mut state = self.lock();
        state.last_updated = Some(Utc::now());
        state.step_executions.push(step_execution);
    }

    /// Step executions recorded so far, in completion order.
    pub fn step_executions(&self) -> Vec<StepExecution> {
        self.lock().step_executions.clone()
    }

    /// Attach transient data to the run. Dropped by [`cleanup`](Self::cleanup).
    pub fn set_transient(&self, key: impl Into<String>, value: serde_json::Value) {
        self.lock().transient.insert(key.into(), value);
    }

    pub fn transient(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().transient.get(key).cloned()
    }

    /// Release transient resources held for the run.
    pub fn cleanup(&self) {
        self.lock().transient.clear();
    }

    /// Serializable view of the execution.
    pub fn snapshot(&self) -> JobExecutionSnapshot {
        let state = self.lock();
        JobExecutionSnapshot {
            execution_id: self.id,
            job_name: self.job_name.clone(),
            parameters: properties_to_string(&self.parameters),
            status: self.status.get(),
            exit_status: state.exit_status.clone(),
            restart_position: state.restart_position.clone(),
            restarted_from: self.restarted_from,
            create_time: self.create_time,
            start_time: state.start_time,
            end_time: state.end_time,
            last_updated: state.last_updated,
            step_executions: state.step_executions.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of a [`JobExecution`], as stored by repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionSnapshot {
    pub execution_id: Uuid,
    pub job_name: String,
    /// Parameters in `key=value` line form.
    pub parameters: String,
    pub status: BatchStatus,
    pub exit_status: Option<String>,
    pub restart_position: Option<String>,
    pub restarted_from: Option<Uuid>,
    pub create_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub step_executions: Vec<StepExecution>,
}

impl JobExecutionSnapshot {
    pub fn parameters(&self) -> Properties {
        string_to_properties(&self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Properties {
        let mut props = Properties::new();
        props.insert("run.date".to_string(), "2026-01-31".to_string());
        props
    }

    #[test]
    fn test_new_execution() {
        let execution = JobExecution::new("payroll", params());
        assert_eq!(execution.status(), BatchStatus::Starting);
        assert_eq!(execution.job_name(), "payroll");
        assert!(execution.restart_position().is_none());
        assert!(execution.start_time().is_none());
    }

    #[test]
    fn test_restart_inherits_position_and_parameters() {
        let prior = JobExecution::new("payroll", params());
        prior.set_restart_position(Some("load".to_string()));

        let restart = JobExecution::restart_of(&prior);
        assert_ne!(restart.id(), prior.id());
        assert_eq!(restart.restarted_from(), Some(prior.id()));
        assert_eq!(restart.parameters(), prior.parameters());
        assert_eq!(restart.take_restart_position(), Some("load".to_string()));
        assert!(restart.restart_position().is_none());
        assert_eq!(prior.restart_position(), Some("load".to_string()));
    }

    #[test]
    fn test_request_stop() {
        let execution = JobExecution::new("payroll", Properties::new());
        assert!(execution.request_stop());
        assert_eq!(execution.status(), BatchStatus::Stopping);

        let done = JobExecution::new("payroll", Properties::new());
        done.status_cell().set(BatchStatus::Completed);
        assert!(!done.request_stop());
        assert_eq!(done.status(), BatchStatus::Completed);
    }

    #[test]
    fn test_snapshot_encodes_parameters() {
        let execution = JobExecution::new("payroll", params());
        execution.add_step_execution(StepExecution::new("a", BatchStatus::Completed, "OK"));
        execution.set_exit_status("OK");

        let snapshot = execution.snapshot();
        assert_eq!(snapshot.parameters, "run.date=2026-01-31\n");
        assert_eq!(snapshot.parameters(), params());
        assert_eq!(snapshot.step_executions.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "STARTING");
        assert_eq!(json["exit_status"], "OK");
    }

    #[test]
    fn test_cleanup_drops_transient_data() {
        let execution = JobExecution::new("payroll", Properties::new());
        execution.set_transient("cursor", serde_json::json!({"offset": 10}));
        assert!(execution.transient("cursor").is_some());
        execution.cleanup();
        assert!(execution.transient("cursor").is_none());
    }
}
