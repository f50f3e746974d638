//! Orchestrator errors.

use fanout_agent_sdk::SdkError;
use thiserror::Error;

/// Discovery failed, so the run never started.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The discovery service errored.
    #[error("Discovery service failed: {0}")]
    Service(#[from] SdkError),

    /// Discovery returned nothing usable.
    #[error("Discovery returned no candidates for '{query}'")]
    NoCandidates { query: String },
}

/// Why a single task failed. Contained to that task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Opening or reading the agent stream failed.
    #[error(transparent)]
    Transport(#[from] SdkError),

    /// The agent sent an error event.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The stream closed without a completion event.
    #[error("Agent stream ended without a result")]
    StreamEnded,
}
