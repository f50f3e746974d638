//! Terminal output for runs.

use std::collections::HashMap;

use serde_json::json;

use fanout_core::{Candidate, CandidateId, RunSnapshot, TaskEntry, TaskState, TaskStatus};

/// Prints one line per task whenever its status, message or live view changes.
pub struct ProgressPrinter {
    enabled: bool,
    seen: HashMap<CandidateId, (TaskStatus, Option<String>, Option<String>)>,
}

impl ProgressPrinter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seen: HashMap::new(),
        }
    }

    pub fn show(&mut self, snapshot: &RunSnapshot) {
        for entry in &snapshot.tasks {
            let state = &entry.state;
            let key = (
                state.status,
                state.status_message.clone(),
                state.live_view_url.clone(),
            );
            if self.seen.get(&entry.candidate.id) == Some(&key) {
                continue;
            }
            let previous = self.seen.insert(entry.candidate.id.clone(), key);

            // Nothing worth printing for a task that has not started
            if previous.is_none() && state.status == TaskStatus::Idle {
                continue;
            }
            if self.enabled {
                println!("{}", progress_line(entry));
            }
        }
    }
}

/// Format one progress line.
pub fn progress_line(entry: &TaskEntry) -> String {
    let state = &entry.state;
    let detail = match state.status {
        TaskStatus::Complete => state
            .outcome
            .as_ref()
            .and_then(|o| o.summary.clone())
            .unwrap_or_default(),
        TaskStatus::Failed => state.error_detail.clone().unwrap_or_default(),
        _ => match (&state.status_message, &state.live_view_url) {
            (Some(message), Some(url)) => format!("{} (live: {})", message, url),
            (Some(message), None) => message.clone(),
            (None, Some(url)) => format!("live: {}", url),
            (None, None) => String::new(),
        },
    };

    format!(
        "[{:<10}] {:<28}  {}",
        state.status.label(),
        entry.candidate.display_name,
        detail
    )
    .trim_end()
    .to_string()
}

/// Print the partitioned summary of a finished run.
pub fn print_summary(snapshot: &RunSnapshot) {
    let summary = snapshot.summary();
    let counts = summary.counts;

    println!();
    println!("Run {} for \"{}\"", snapshot.run_id, snapshot.query);
    println!(
        "  {} candidates: {} available, {} unavailable, {} failed, {} cancelled ({} timed out)",
        counts.total,
        counts.available,
        counts.unavailable,
        counts.failed,
        counts.cancelled,
        counts.timed_out
    );

    print_section("Available", &summary.available, snapshot);
    print_section("Unavailable", &summary.unavailable, snapshot);

    let failed: Vec<&TaskEntry> = snapshot
        .tasks
        .iter()
        .filter(|t| t.state.status == TaskStatus::Failed)
        .collect();
    if !failed.is_empty() {
        println!("Failed:");
        for entry in failed {
            println!(
                "  - {:<28}  {}",
                entry.candidate.display_name,
                entry.state.error_detail.as_deref().unwrap_or("")
            );
        }
    }
}

fn print_section(title: &str, candidates: &[Candidate], snapshot: &RunSnapshot) {
    if candidates.is_empty() {
        return;
    }
    println!("{}:", title);
    for candidate in candidates {
        let Some(entry) = snapshot.task(&candidate.id) else {
            continue;
        };
        let outcome = entry.state.outcome.as_ref();
        let url = outcome
            .and_then(|o| o.url.as_deref())
            .unwrap_or(&candidate.target_url);
        println!(
            "  - {:<28}  {}  {}",
            candidate.display_name,
            url,
            format_elapsed(&entry.state)
        );
        if let Some(summary) = outcome.and_then(|o| o.summary.as_deref()) {
            println!("      {}", summary);
        }
    }
}

fn format_elapsed(state: &TaskState) -> String {
    match (state.started_at, state.finished_at) {
        (Some(start), Some(end)) => {
            let millis = (end - start).num_milliseconds().max(0);
            format!("({:.1}s)", millis as f64 / 1000.0)
        }
        _ => String::new(),
    }
}

/// Final snapshot and summary as pretty JSON.
pub fn render_json(snapshot: &RunSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({
        "snapshot": snapshot,
        "summary": snapshot.summary(),
    }))
}
