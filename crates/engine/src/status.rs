//! Batch status model.
//!
//! Every execution scope (job, flow, split, step) carries a [`BatchStatus`].
//! Scopes running on different tasks may write the same ancestor status, so
//! the value lives in a [`StatusCell`] that only ever moves forward.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state of an execution scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Created, not yet running.
    Starting,
    /// Running.
    Started,
    /// A stop was requested; observed at the next check point.
    Stopping,
    /// Stopped; the job can be restarted from its restart position.
    Stopped,
    /// Failed.
    Failed,
    /// Completed normally.
    Completed,
    /// Abandoned; never restarted.
    Abandoned,
}

impl BatchStatus {
    /// Terminal statuses are never replaced by a non-terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Failed | Self::Completed | Self::Abandoned
        )
    }

    /// Upper-case name, also the default exit status of a scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Failed => "FAILED",
            Self::Completed => "COMPLETED",
            Self::Abandoned => "ABANDONED",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Started => 1,
            Self::Stopping => 2,
            Self::Stopped => 3,
            Self::Failed => 4,
            Self::Completed => 5,
            Self::Abandoned => 6,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Started,
            2 => Self::Stopping,
            3 => Self::Stopped,
            4 => Self::Failed,
            5 => Self::Completed,
            _ => Self::Abandoned,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STARTING" => Ok(Self::Starting),
            "STARTED" => Ok(Self::Started),
            "STOPPING" => Ok(Self::Stopping),
            "STOPPED" => Ok(Self::Stopped),
            "FAILED" => Ok(Self::Failed),
            "COMPLETED" => Ok(Self::Completed),
            "ABANDONED" => Ok(Self::Abandoned),
            other => Err(format!("unknown batch status: {}", other)),
        }
    }
}

/// Atomic holder for a [`BatchStatus`].
///
/// Writes follow one rule: a terminal value is never replaced by a
/// non-terminal one. From a terminal value only `FAILED` is accepted, and
/// `ABANDONED` accepts nothing.
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(status: BatchStatus) -> Self {
        Self(AtomicU8::new(status.to_u8()))
    }

    pub fn get(&self) -> BatchStatus {
        BatchStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Set a new status. Returns false when the write was refused.
    pub fn set(&self, status: BatchStatus) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let from = BatchStatus::from_u8(current);
            if !Self::accepts(from, status) {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                status.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Move from `from` to `to` only if the current value is exactly `from`.
    pub fn transition(&self, from: BatchStatus, to: BatchStatus) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn accepts(from: BatchStatus, to: BatchStatus) -> bool {
        if !from.is_terminal() {
            return true;
        }
        from != BatchStatus::Abandoned && to == BatchStatus::Failed
    }
}

impl Clone for StatusCell {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_parse() {
        assert_eq!(BatchStatus::Completed.to_string(), "COMPLETED");
        assert_eq!("stopping".parse::<BatchStatus>(), Ok(BatchStatus::Stopping));
        assert!("paused".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&BatchStatus::Abandoned).unwrap();
        assert_eq!(json, "\"ABANDONED\"");
    }

    #[test]
    fn test_terminal_never_goes_back() {
        let cell = StatusCell::new(BatchStatus::Started);
        assert!(cell.set(BatchStatus::Completed));
        assert!(!cell.set(BatchStatus::Started));
        assert!(!cell.set(BatchStatus::Stopping));
        assert_eq!(cell.get(), BatchStatus::Completed);
    }

    #[test]
    fn test_failure_dominates_terminal() {
        let cell = StatusCell::new(BatchStatus::Stopped);
        assert!(cell.set(BatchStatus::Failed));
        assert!(cell.set(BatchStatus::Failed));
        assert!(!cell.set(BatchStatus::Completed));
        assert_eq!(cell.get(), BatchStatus::Failed);
    }

    #[test]
    fn test_abandoned_is_final() {
        let cell = StatusCell::new(BatchStatus::Abandoned);
        assert!(!cell.set(BatchStatus::Failed));
        assert_eq!(cell.get(), BatchStatus::Abandoned);
    }

    #[test]
    fn test_transition_requires_exact_source() {
        let cell = StatusCell::new(BatchStatus::Stopping);
        assert!(!cell.transition(BatchStatus::Starting, BatchStatus::Started));
        assert_eq!(cell.get(), BatchStatus::Stopping);

        let cell = StatusCell::new(BatchStatus::Starting);
        assert!(cell.transition(BatchStatus::Starting, BatchStatus::Started));
        assert_eq!(cell.get(), BatchStatus::Started);
    }

    #[test]
    fn test_concurrent_failures_are_idempotent() {
        let cell = std::sync::Arc::new(StatusCell::new(BatchStatus::Started));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || cell.set(BatchStatus::Failed))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cell.get(), BatchStatus::Failed);
    }
}
