//! Result aggregation over task states.
//!
//! Everything here is recomputed from the task list alone, so the same
//! input always gives the same summary.

use serde::{Deserialize, Serialize};

use crate::{Candidate, TaskEntry, TaskStatus};

/// Per-bucket counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total: usize,
    pub available: usize,
    pub unavailable: usize,
    pub in_progress: usize,
    pub idle: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Completed tasks whose outcome came from the timeout (subset of available/unavailable).
    pub timed_out: usize,
}

impl SummaryCounts {
    /// Number of tasks in a terminal state.
    pub fn terminal(&self) -> usize {
        self.available + self.unavailable + self.failed + self.cancelled
    }
}

/// Partitioned view of a run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub available: Vec<Candidate>,
    pub unavailable: Vec<Candidate>,
    pub in_progress: Vec<Candidate>,
    pub counts: SummaryCounts,
}

/// Partition tasks into available, unavailable and in-progress.
///
/// Idle, failed and cancelled tasks are left out of the lists and only
/// counted.
pub fn summarize(tasks: &[TaskEntry]) -> RunSummary {
    let mut summary = RunSummary::default();
    summary.counts.total = tasks.len();

    for entry in tasks {
        let counts = &mut summary.counts;
        match entry.state.status {
            TaskStatus::Complete => {
                let outcome = entry.state.outcome.as_ref();
                if outcome.is_some_and(|o| o.is_timed_out()) {
                    counts.timed_out += 1;
                }
                if outcome.is_some_and(|o| o.available) {
                    counts.available += 1;
                    summary.available.push(entry.candidate.clone());
                } else {
                    counts.unavailable += 1;
                    summary.unavailable.push(entry.candidate.clone());
                }
            }
            TaskStatus::Connecting | TaskStatus::Active => {
                counts.in_progress += 1;
                summary.in_progress.push(entry.candidate.clone());
            }
            TaskStatus::Idle => counts.idle += 1,
            TaskStatus::Failed => counts.failed += 1,
            TaskStatus::Cancelled => counts.cancelled += 1,
        }
    }

    summary
}
