//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineResult;

/// What happens to branches still running when a split times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitTimeoutPolicy {
    /// Abort the outstanding branch tasks.
    #[default]
    Cancel,
    /// Let them finish in the background; their results are discarded.
    Detach,
}

/// Engine configuration loaded from environment variables.
///
/// Environment variables are prefixed with `JOBFLOW_`:
/// - `JOBFLOW_SPLIT_TIMEOUT_MS`: split join bound in milliseconds, `0` waits forever (default: 300000)
/// - `JOBFLOW_SPLIT_TIMEOUT_POLICY`: `cancel` or `detach` (default: cancel)
/// - `JOBFLOW_MAX_CONCURRENT_STEPS`: steps running at once, `0` is unbounded (default: 0)
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_split_timeout_ms")]
    pub split_timeout_ms: u64,

    #[serde(default)]
    pub split_timeout_policy: SplitTimeoutPolicy,

    #[serde(default)]
    pub max_concurrent_steps: usize,
}

fn default_split_timeout_ms() -> u64 {
    300_000
}

impl EngineConfig {
    /// Load configuration from `JOBFLOW_`-prefixed environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Ok(envy::prefixed("JOBFLOW_").from_env::<EngineConfig>()?)
    }

    /// Join bound for splits, `None` when unbounded.
    pub fn split_timeout(&self) -> Option<Duration> {
        match self.split_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Bound split joins by `timeout`, `Duration::ZERO` for no bound. A
    /// non-zero bound below one millisecond rounds up to one.
    pub fn with_split_timeout(mut self, timeout: Duration) -> Self {
        self.split_timeout_ms = match u64::try_from(timeout.as_millis()) {
            Ok(0) if !timeout.is_zero() => 1,
            Ok(ms) => ms,
            Err(_) => u64::MAX,
        };
        self
    }

    pub fn with_split_timeout_policy(mut self, policy: SplitTimeoutPolicy) -> Self {
        self.split_timeout_policy = policy;
        self
    }

    pub fn with_max_concurrent_steps(mut self, max: usize) -> Self {
        self.max_concurrent_steps = max;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            split_timeout_ms: default_split_timeout_ms(),
            split_timeout_policy: SplitTimeoutPolicy::default(),
            max_concurrent_steps: 0,
        }
    }
}
