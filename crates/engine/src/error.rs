//! Engine error types.

use thiserror::Error;

/// Errors raised while sequencing job elements.
///
/// Configuration errors are fatal to the scope that hits them; none of these
/// are retried by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A transition or restart position names an element the container does not hold.
    #[error("Unrecognizable job element '{name}' in '{container}'")]
    UnknownElement { name: String, container: String },

    /// A decision was found where a runnable head element was expected.
    #[error("Decision '{0}' cannot be the first element: no step result to decide on")]
    DecisionFirst(String),

    /// A decision produced an exit status none of its rules match.
    #[error("Decision '{decision}' has no transition for exit status '{exit_status}'")]
    NoDecisionTransition {
        decision: String,
        exit_status: String,
    },

    /// Structural validation of a job graph failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An artifact could not be created.
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// A job listener hook failed.
    #[error("Listener '{listener}' failed: {message}")]
    Listener { listener: String, message: String },

    /// A decider failed while deciding.
    #[error("Decider '{decider}' failed: {message}")]
    Decider { decider: String, message: String },

    /// A step runner returned an error.
    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    /// The job repository rejected an update.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Unexpected failure while scheduling or joining split branches.
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Split branches did not finish within the configured bound.
    #[error("Split '{split}' timed out after {millis} ms")]
    SplitTimeout { split: String, millis: u64 },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Returns true for errors caused by the job definition itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownElement { .. }
                | EngineError::DecisionFirst(_)
                | EngineError::NoDecisionTransition { .. }
                | EngineError::Validation(_)
        )
    }
}

impl From<envy::Error> for EngineError {
    fn from(e: envy::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
