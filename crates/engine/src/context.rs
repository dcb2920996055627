//! Execution context hierarchy.
//!
//! Each running scope (job, flow, split, step) owns an [`ExecutionContext`]
//! holding its status, its exit status, and the chain of enclosing contexts.
//! The chain is fixed when the context is built; failure and stop
//! propagation walk it outward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::execution::JobExecution;
use crate::properties::Properties;
use crate::status::{BatchStatus, StatusCell};

/// Kind of scope a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Job,
    Flow,
    Split,
    Step,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Job => write!(f, "job"),
            Self::Flow => write!(f, "flow"),
            Self::Split => write!(f, "split"),
            Self::Step => write!(f, "step"),
        }
    }
}

/// Runtime state of one scope plus its ancestors.
#[derive(Debug)]
pub struct ExecutionContext {
    scope: Scope,
    id: String,
    root_element: Option<String>,
    status: Arc<StatusCell>,
    exit_status: Mutex<Option<String>>,
    outer: Vec<Arc<ExecutionContext>>,
    /// Release flags of the enclosing splits, innermost last.
    released: Vec<Arc<AtomicBool>>,
    job_execution: Arc<JobExecution>,
}

impl ExecutionContext {
    /// Job-scope context. Shares its status with the execution record.
    pub fn job(job_id: impl Into<String>, job_execution: Arc<JobExecution>) -> Arc<Self> {
        Arc::new(Self {
            scope: Scope::Job,
            id: job_id.into(),
            root_element: None,
            status: job_execution.status_cell(),
            exit_status: Mutex::new(None),
            outer: Vec::new(),
            released: Vec::new(),
            job_execution,
        })
    }

    /// Context for an element running directly inside `parent`.
    pub fn child(parent: &Arc<Self>, scope: Scope, id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        let root_element = match parent.scope {
            Scope::Job => Some(id.clone()),
            _ => parent.root_element.clone(),
        };
        let mut outer = parent.outer.clone();
        outer.push(parent.clone());
        let mut released = parent.released.clone();
        if scope == Scope::Split {
            released.push(Arc::new(AtomicBool::new(false)));
        }

        Arc::new(Self {
            scope,
            id,
            root_element,
            status: Arc::new(StatusCell::new(BatchStatus::Starting)),
            exit_status: Mutex::new(None),
            outer,
            released,
            job_execution: parent.job_execution.clone(),
        })
    }

    /// Flow context for one branch of `split`.
    ///
    /// The chain holds a private copy of the job scope and nothing else, so a
    /// branch cannot write the split or its ancestors. The split applies the
    /// aggregated outcome to them after joining.
    pub fn branch(split: &Arc<Self>, flow_id: impl Into<String>) -> Arc<Self> {
        let job = match split.job_context() {
            Some(job) => job.clone_for_branch(),
            None => split.clone_for_branch(),
        };
        let flow_id = flow_id.into();

        Arc::new(Self {
            scope: Scope::Flow,
            id: flow_id,
            root_element: split.root_element.clone(),
            status: Arc::new(StatusCell::new(BatchStatus::Starting)),
            exit_status: Mutex::new(None),
            outer: vec![job],
            released: split.released.clone(),
            job_execution: split.job_execution.clone(),
        })
    }

    /// Detached copy of this context: own status and exit status, same
    /// execution record, no ancestors.
    pub fn clone_for_branch(&self) -> Arc<Self> {
        Arc::new(Self {
            scope: self.scope,
            id: self.id.clone(),
            root_element: self.root_element.clone(),
            status: Arc::new(StatusCell::new(self.status.get())),
            exit_status: Mutex::new(self.exit_status()),
            outer: Vec::new(),
            released: self.released.clone(),
            job_execution: self.job_execution.clone(),
        })
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Job-level element this scope descends from. `None` for the job itself.
    pub fn root_element(&self) -> Option<&str> {
        self.root_element.as_deref()
    }

    pub fn status(&self) -> BatchStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: BatchStatus) -> bool {
        self.status.set(status)
    }

    pub(crate) fn transition(&self, from: BatchStatus, to: BatchStatus) -> bool {
        self.status.transition(from, to)
    }

    pub fn exit_status(&self) -> Option<String> {
        self.lock_exit().clone()
    }

    pub fn set_exit_status(&self, exit_status: impl Into<String>) {
        *self.lock_exit() = Some(exit_status.into());
    }

    /// Exit status, or the status name when none was set.
    pub fn effective_exit_status(&self) -> String {
        self.exit_status()
            .unwrap_or_else(|| self.status().as_str().to_string())
    }

    pub fn outer(&self) -> &[Arc<ExecutionContext>] {
        &self.outer
    }

    /// Nearest job-scope ancestor.
    pub fn job_context(&self) -> Option<&Arc<ExecutionContext>> {
        self.outer.iter().find(|ctx| ctx.scope == Scope::Job)
    }

    pub fn job_execution(&self) -> &Arc<JobExecution> {
        &self.job_execution
    }

    /// Whether a stop was requested for the run.
    pub fn stop_requested(&self) -> bool {
        self.job_execution.status() == BatchStatus::Stopping
    }

    /// Stop waiting on the branches of this split. Everything below it is
    /// released: its results no longer reach the execution record.
    pub(crate) fn release_branches(&self) {
        if self.scope == Scope::Split {
            if let Some(flag) = self.released.last() {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Whether an enclosing split stopped waiting on this scope.
    pub fn is_released(&self) -> bool {
        self.released.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    /// Mark this scope and every enclosing scope FAILED.
    pub fn fail(&self) {
        self.propagate(BatchStatus::Failed);
    }

    /// Mark this scope and every enclosing scope STOPPED.
    pub fn stop(&self) {
        self.propagate(BatchStatus::Stopped);
    }

    fn propagate(&self, status: BatchStatus) {
        self.status.set(status);
        for ctx in &self.outer {
            ctx.status.set(status);
        }
    }

    fn lock_exit(&self) -> MutexGuard<'_, Option<String>> {
        self.exit_status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a step runner sees while running a step.
#[derive(Debug, Clone)]
pub struct StepContext {
    ctx: Arc<ExecutionContext>,
}

impl StepContext {
    pub(crate) fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }

    pub fn step_id(&self) -> &str {
        self.ctx.id()
    }

    pub fn execution_id(&self) -> Uuid {
        self.ctx.job_execution().id()
    }

    pub fn job_name(&self) -> &str {
        self.ctx.job_execution().job_name()
    }

    pub fn job_parameters(&self) -> &Properties {
        self.ctx.job_execution().parameters()
    }

    /// Whether a stop was requested while the step runs.
    pub fn stop_requested(&self) -> bool {
        self.ctx.stop_requested()
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }
}
