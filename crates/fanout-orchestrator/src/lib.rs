//! Fanout orchestrator
//!
//! Runs one query against many candidates at once: discovery proposes the
//! candidates, one remote agent task is dispatched per candidate, and each
//! task's event stream is folded into a shared run state that callers can
//! snapshot, observe or cancel.
//!
//! Task failures stay contained to their task. A run is finished exactly
//! once, either when every task reaches a terminal state or when it is
//! cancelled.

mod config;
mod error;
mod orchestrator;
mod runner;
mod session;

#[cfg(test)]
mod testing;

pub use config::{render_goal, OrchestratorConfig, RunRequest, StreamEndPolicy, DEFAULT_GOAL_TEMPLATE};
pub use error::{DiscoveryError, TaskError};
pub use orchestrator::Orchestrator;
pub use session::RunHandle;
