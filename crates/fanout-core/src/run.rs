//! Point-in-time views of a run.

use serde::{Deserialize, Serialize};

use crate::{summarize, Candidate, CandidateId, RunId, RunPhase, RunSummary, TaskState};

/// A candidate together with its task state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub candidate: Candidate,
    pub state: TaskState,
}

/// Snapshot of a run handed to observers.
///
/// `tasks` is in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Run identifier.
    pub run_id: RunId,

    /// The user query that started the run.
    pub query: String,

    /// Current phase.
    pub phase: RunPhase,

    /// One entry per candidate.
    pub tasks: Vec<TaskEntry>,

    /// Number of tasks that reached a terminal state.
    pub terminal_count: usize,

    /// Increases by one with every published change.
    pub version: u64,
}

impl RunSnapshot {
    /// Look up a task by candidate id.
    pub fn task(&self, id: &CandidateId) -> Option<&TaskEntry> {
        self.tasks.iter().find(|entry| &entry.candidate.id == id)
    }

    /// Returns true once the run is finished and every task is terminal.
    pub fn is_settled(&self) -> bool {
        self.phase == RunPhase::Finished && self.tasks.iter().all(|t| t.state.is_terminal())
    }

    /// Aggregate the tasks for display.
    pub fn summary(&self) -> RunSummary {
        summarize(&self.tasks)
    }
}
