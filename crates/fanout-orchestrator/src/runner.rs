//! Drives one candidate's agent task from dispatch to a terminal state.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use fanout_agent_sdk::{decode_stream, AgentEvent, AgentService};
use fanout_core::{Candidate, Outcome, TaskUpdate, Transition};

use crate::config::StreamEndPolicy;
use crate::error::TaskError;
use crate::session::RunShared;

/// Progress text used when the agent sends a progress event without a message.
const DEFAULT_PROGRESS: &str = "Agent is working";

/// Error text used when the agent sends an error event without a message.
const DEFAULT_AGENT_ERROR: &str = "agent reported an error without details";

/// Runs a single agent task. The only writer of its slot.
pub(crate) struct TaskRunner {
    pub index: usize,
    pub candidate: Candidate,
    pub goal: String,
    pub timeout: Duration,
    pub stream_end: StreamEndPolicy,
    pub agent: Arc<dyn AgentService>,
    pub shared: Arc<RunShared>,
    pub cancel: CancellationToken,
}

impl TaskRunner {
    pub async fn run(self) {
        info!(
            run_id = %self.shared.run_id(),
            candidate = %self.candidate.id,
            url = %self.candidate.target_url,
            "Dispatching agent task"
        );
        self.apply(TaskUpdate::Dispatched);

        let deadline = sleep(self.timeout);
        tokio::pin!(deadline);

        let bytes = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.cancelled();
                return;
            }
            opened = self.agent.start_task(&self.candidate, &self.goal) => match opened {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.failed(TaskError::Transport(e));
                    return;
                }
            },
            _ = &mut deadline => {
                self.timed_out();
                return;
            }
        };

        let mut events = Box::pin(decode_stream(bytes));
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.cancelled();
                    break;
                }
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        if self.handle_event(event) == Transition::Terminal {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        self.failed(TaskError::Transport(e));
                        break;
                    }
                    None => {
                        self.stream_ended();
                        break;
                    }
                },
                _ = &mut deadline => {
                    self.timed_out();
                    break;
                }
            }
        }

        drop(events);
        debug!(candidate = %self.candidate.id, "Agent stream released");
    }

    fn handle_event(&self, event: AgentEvent) -> Transition {
        trace!(candidate = %self.candidate.id, kind = event.kind(), "Agent event");
        match event {
            AgentEvent::Progress { message } => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PROGRESS.to_string());
                self.apply(TaskUpdate::Progress(message))
            }
            AgentEvent::LiveView { url } => {
                debug!(candidate = %self.candidate.id, url = %url, "Live view available");
                self.apply(TaskUpdate::LiveView(url))
            }
            AgentEvent::Complete { result } => {
                let outcome = Outcome::from_agent_result(result.as_ref(), &self.candidate);
                info!(
                    candidate = %self.candidate.id,
                    available = outcome.available,
                    source = ?outcome.source,
                    "Agent task complete"
                );
                self.apply(TaskUpdate::Completed(outcome))
            }
            AgentEvent::Error { message } => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_AGENT_ERROR.to_string());
                self.failed(TaskError::Agent(message))
            }
            AgentEvent::Unknown => Transition::Ignored,
        }
    }

    fn stream_ended(&self) -> Transition {
        match self.stream_end {
            StreamEndPolicy::Fail => self.failed(TaskError::StreamEnded),
            StreamEndPolicy::CompleteWithFallback => {
                warn!(candidate = %self.candidate.id, "Agent stream ended without a result, using fallback");
                self.apply(TaskUpdate::Completed(Outcome::stream_ended(&self.candidate)))
            }
        }
    }

    fn timed_out(&self) -> Transition {
        warn!(
            candidate = %self.candidate.id,
            timeout_secs = self.timeout.as_secs_f64(),
            "Agent task timed out"
        );
        self.apply(TaskUpdate::Completed(Outcome::timed_out(&self.candidate)))
    }

    fn failed(&self, error: TaskError) -> Transition {
        warn!(candidate = %self.candidate.id, error = %error, "Agent task failed");
        self.apply(TaskUpdate::Failed(error.to_string()))
    }

    fn cancelled(&self) -> Transition {
        debug!(candidate = %self.candidate.id, "Agent task cancelled");
        self.apply(TaskUpdate::Cancelled)
    }

    fn apply(&self, update: TaskUpdate) -> Transition {
        let applied = self.shared.apply(self.index, update);
        if applied.finished_run {
            debug!(
                run_id = %self.shared.run_id(),
                candidate = %self.candidate.id,
                "Last task settled the run"
            );
        }
        applied.transition
    }
}
