//! Transition rules attached to job elements.

use serde::{Deserialize, Serialize};

/// Exit-status pattern paired with a disposition.
///
/// `on` supports `*` (any substring) and `?` (one character). Rules are
/// evaluated in declared order and the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionRule {
    /// Continue with the named sibling element.
    Next { on: String, to: String },

    /// Finish the current container normally.
    End {
        on: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_status: Option<String>,
    },

    /// Stop the job; a restart resumes at `restart`.
    Stop {
        on: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        restart: Option<String>,
    },

    /// Fail the job.
    Fail {
        on: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_status: Option<String>,
    },
}

impl TransitionRule {
    pub fn next(on: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Next {
            on: on.into(),
            to: to.into(),
        }
    }

    pub fn end(on: impl Into<String>) -> Self {
        Self::End {
            on: on.into(),
            exit_status: None,
        }
    }

    pub fn stop(on: impl Into<String>, restart: Option<&str>) -> Self {
        Self::Stop {
            on: on.into(),
            exit_status: None,
            restart: restart.map(str::to_string),
        }
    }

    pub fn fail(on: impl Into<String>) -> Self {
        Self::Fail {
            on: on.into(),
            exit_status: None,
        }
    }

    /// The exit-status pattern of this rule.
    pub fn on(&self) -> &str {
        match self {
            Self::Next { on, .. }
            | Self::End { on, .. }
            | Self::Stop { on, .. }
            | Self::Fail { on, .. } => on,
        }
    }
}
