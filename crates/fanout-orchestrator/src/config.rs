//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use fanout_core::Candidate;

/// What to do when an agent stream closes without a completion event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEndPolicy {
    /// Mark the task failed.
    #[default]
    Fail,
    /// Complete the task with a fallback outcome.
    CompleteWithFallback,
}

/// Default goal sent to each agent.
pub const DEFAULT_GOAL_TEMPLATE: &str =
    "Visit {url} and find out whether {name} can help with: {query}. \
     Finish with a JSON object {\"available\": bool, \"summary\": string}.";

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for each agent task.
    pub task_timeout: Duration,

    /// Goal sent to each agent; `{query}`, `{name}` and `{url}` are substituted.
    pub goal_template: String,

    /// Handling of streams that end without a result.
    pub stream_end: StreamEndPolicy,

    /// Maximum number of candidates dispatched per run.
    pub max_candidates: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(300),
            goal_template: DEFAULT_GOAL_TEMPLATE.to_string(),
            stream_end: StreamEndPolicy::Fail,
            max_candidates: 8,
        }
    }
}

/// A request to start one run, with optional per-run overrides.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The user query.
    pub query: String,

    /// Overrides [`OrchestratorConfig::task_timeout`].
    pub task_timeout: Option<Duration>,

    /// Overrides [`OrchestratorConfig::goal_template`].
    pub goal_template: Option<String>,
}

impl RunRequest {
    /// Create a request with no overrides.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            task_timeout: None,
            goal_template: None,
        }
    }

    /// Builder method to set the per-task timeout for this run.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Builder method to set the goal template for this run.
    pub fn with_goal_template(mut self, template: impl Into<String>) -> Self {
        self.goal_template = Some(template.into());
        self
    }
}

/// Fill in a goal template for one candidate.
pub fn render_goal(template: &str, query: &str, candidate: &Candidate) -> String {
    template
        .replace("{query}", query)
        .replace("{name}", &candidate.display_name)
        .replace("{url}", &candidate.target_url)
}
