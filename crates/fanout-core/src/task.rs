//! Per-candidate task state and its reducer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Outcome, TaskStatus};

/// Live state of one candidate's agent task.
///
/// Only mutated through [`TaskState::apply`], which keeps these invariants:
/// - `live_view_url` is set only while Connecting or Active.
/// - `outcome` is set iff the status is Complete.
/// - `error_detail` is set iff the status is Failed.
/// - The first terminal transition wins; later updates are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    /// Current status.
    pub status: TaskStatus,

    /// Last human-readable progress message.
    pub status_message: Option<String>,

    /// Embeddable live view of the agent session.
    pub live_view_url: Option<String>,

    /// Result, present only when Complete.
    pub outcome: Option<Outcome>,

    /// Failure reason, present only when Failed.
    pub error_detail: Option<String>,

    /// When dispatch began.
    pub started_at: Option<DateTime<Utc>>,

    /// When a terminal state was reached.
    pub finished_at: Option<DateTime<Utc>>,
}

/// A single change requested of a [`TaskState`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    /// Dispatch is starting.
    Dispatched,
    /// Progress message from the agent.
    Progress(String),
    /// Live view URL announced by the agent.
    LiveView(String),
    /// The task finished with an outcome.
    Completed(Outcome),
    /// The task failed.
    Failed(String),
    /// The run was cancelled.
    Cancelled,
}

/// What [`TaskState::apply`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The update did not apply in the current state.
    Ignored,
    /// Fields changed; the task is still running.
    Updated,
    /// The task just reached a terminal state. Returned at most once.
    Terminal,
}

impl TaskState {
    /// Create an idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if this task completed with a timeout fallback.
    pub fn timed_out(&self) -> bool {
        self.outcome.as_ref().is_some_and(Outcome::is_timed_out)
    }

    /// Apply one update as a field-level merge.
    pub fn apply(&mut self, update: TaskUpdate) -> Transition {
        if self.is_terminal() {
            return Transition::Ignored;
        }

        match update {
            TaskUpdate::Dispatched => {
                if self.status != TaskStatus::Idle {
                    return Transition::Ignored;
                }
                self.status = TaskStatus::Connecting;
                self.started_at = Some(Utc::now());
                Transition::Updated
            }
            TaskUpdate::Progress(message) => {
                if !self.status.is_in_flight() {
                    return Transition::Ignored;
                }
                self.status = TaskStatus::Active;
                self.status_message = Some(message);
                Transition::Updated
            }
            TaskUpdate::LiveView(url) => {
                if !self.status.is_in_flight() {
                    return Transition::Ignored;
                }
                self.status = TaskStatus::Active;
                self.live_view_url = Some(url);
                Transition::Updated
            }
            TaskUpdate::Completed(outcome) => {
                if !self.status.is_in_flight() {
                    return Transition::Ignored;
                }
                self.finish(TaskStatus::Complete);
                self.outcome = Some(outcome);
                Transition::Terminal
            }
            TaskUpdate::Failed(detail) => {
                if !self.status.is_in_flight() {
                    return Transition::Ignored;
                }
                self.finish(TaskStatus::Failed);
                self.error_detail = Some(detail);
                Transition::Terminal
            }
            TaskUpdate::Cancelled => {
                self.finish(TaskStatus::Cancelled);
                Transition::Terminal
            }
        }
    }

    fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.live_view_url = None;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Candidate, CandidateId};

    fn candidate() -> Candidate {
        Candidate::new(CandidateId::new("0-acme"), "Acme", "https://acme.test").unwrap()
    }

    fn active() -> TaskState {
        let mut state = TaskState::new();
        state.apply(TaskUpdate::Dispatched);
        state.apply(TaskUpdate::LiveView("https://live.test/1".to_string()));
        state
    }

    fn assert_invariants(state: &TaskState) {
        if state.live_view_url.is_some() {
            assert!(state.status.is_in_flight());
        }
        assert_eq!(state.outcome.is_some(), state.status == TaskStatus::Complete);
        assert_eq!(state.error_detail.is_some(), state.status == TaskStatus::Failed);
    }

    #[test]
    fn test_dispatch_then_first_event_activates() {
        let mut state = TaskState::new();
        assert_eq!(state.apply(TaskUpdate::Dispatched), Transition::Updated);
        assert_eq!(state.status, TaskStatus::Connecting);
        assert!(state.started_at.is_some());

        state.apply(TaskUpdate::Progress("Opening site".to_string()));
        assert_eq!(state.status, TaskStatus::Active);
        assert_eq!(state.status_message.as_deref(), Some("Opening site"));
        assert_invariants(&state);
    }

    #[test]
    fn test_progress_while_idle_is_ignored() {
        let mut state = TaskState::new();
        assert_eq!(
            state.apply(TaskUpdate::Progress("early".to_string())),
            Transition::Ignored
        );
        assert_eq!(state, TaskState::new());
    }

    #[test]
    fn test_progress_keeps_live_view() {
        let mut state = active();
        state.apply(TaskUpdate::Progress("Reading page".to_string()));
        assert_eq!(state.live_view_url.as_deref(), Some("https://live.test/1"));
        assert_eq!(state.status_message.as_deref(), Some("Reading page"));
    }

    #[test]
    fn test_complete_clears_live_view() {
        let mut state = active();
        let transition = state.apply(TaskUpdate::Completed(Outcome::fallback(&candidate())));

        assert_eq!(transition, Transition::Terminal);
        assert_eq!(state.status, TaskStatus::Complete);
        assert!(state.live_view_url.is_none());
        assert!(state.finished_at.is_some());
        assert_invariants(&state);
    }

    #[test]
    fn test_first_terminal_wins() {
        let mut state = active();
        state.apply(TaskUpdate::Completed(Outcome::timed_out(&candidate())));

        let late = Outcome::from_agent_result(
            Some(&serde_json::json!({"available": false})),
            &candidate(),
        );
        assert_eq!(state.apply(TaskUpdate::Completed(late)), Transition::Ignored);
        assert_eq!(
            state.apply(TaskUpdate::Failed("boom".to_string())),
            Transition::Ignored
        );
        assert_eq!(state.apply(TaskUpdate::Cancelled), Transition::Ignored);

        assert!(state.timed_out());
        assert_invariants(&state);
    }

    #[test]
    fn test_double_error_is_terminal_once() {
        let mut state = active();
        assert_eq!(
            state.apply(TaskUpdate::Failed("first".to_string())),
            Transition::Terminal
        );
        assert_eq!(
            state.apply(TaskUpdate::Failed("second".to_string())),
            Transition::Ignored
        );
        assert_eq!(state.error_detail.as_deref(), Some("first"));
        assert_invariants(&state);
    }

    #[test]
    fn test_cancel_from_idle() {
        let mut state = TaskState::new();
        assert_eq!(state.apply(TaskUpdate::Cancelled), Transition::Terminal);
        assert_eq!(state.status, TaskStatus::Cancelled);
        assert!(state.outcome.is_none());
        assert!(state.error_detail.is_none());
    }

    #[test]
    fn test_events_after_terminal_are_noops() {
        let mut state = active();
        state.apply(TaskUpdate::Cancelled);
        let before = state.clone();

        state.apply(TaskUpdate::Progress("late".to_string()));
        state.apply(TaskUpdate::LiveView("https://late.test".to_string()));
        assert_eq!(state, before);
    }
}
