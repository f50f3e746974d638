//! Status enums for candidate tasks and runs.

use serde::{Deserialize, Serialize};

/// Status of one candidate's agent task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task created but not yet dispatched.
    #[default]
    Idle,
    /// Dispatch started, waiting for the first agent event.
    Connecting,
    /// Agent is reporting progress.
    Active,
    /// Agent finished, or the task timed out with a fallback outcome.
    Complete,
    /// Agent reported an error or the transport failed.
    Failed,
    /// Task was cancelled with its run. Not an error.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Returns true while the agent is being dispatched or is working.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }

    /// Short lowercase label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Phase of a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// No run started.
    #[default]
    Idle,
    /// Waiting on the discovery service.
    Discovering,
    /// Tasks dispatched, at least one still running.
    Running,
    /// Every task reached a terminal state, or the run was cancelled.
    Finished,
}

impl RunPhase {
    /// Short lowercase label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Idle.is_terminal());
        assert!(!TaskStatus::Connecting.is_terminal());
        assert!(!TaskStatus::Active.is_terminal());
        assert!(TaskStatus::Complete.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Connecting).unwrap();
        assert_eq!(json, "\"CONNECTING\"");
        let phase: RunPhase = serde_json::from_str("\"FINISHED\"").unwrap();
        assert_eq!(phase, RunPhase::Finished);
    }
}
