//! Wire types for the discovery and agent services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event decoded from an agent's SSE stream.
///
/// The `type` field selects the variant. Unknown discriminators decode to
/// [`AgentEvent::Unknown`] so newer agents do not break older clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Human-readable progress update.
    #[serde(alias = "status")]
    Progress {
        #[serde(default, alias = "text")]
        message: Option<String>,
    },

    /// URL of an embeddable live view of the agent session.
    #[serde(alias = "liveView", alias = "live_url", alias = "streaming_url")]
    LiveView {
        #[serde(alias = "liveUrl", alias = "live_url", alias = "streamingUrl", alias = "streaming_url")]
        url: String,
    },

    /// The agent finished. `result` may be an object or a JSON-encoded string.
    #[serde(alias = "completed", alias = "done", alias = "result")]
    Complete {
        #[serde(default, alias = "data", alias = "output")]
        result: Option<Value>,
    },

    /// The agent gave up with an error.
    Error {
        #[serde(default, alias = "error")]
        message: Option<String>,
    },

    /// Discriminator this client does not know about.
    #[serde(other)]
    Unknown,
}

impl AgentEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::LiveView { .. } => "live_view",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Request body for the discovery service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub query: String,
}

/// Response body from the discovery service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    #[serde(default)]
    pub candidates: Vec<CandidateRecord>,
}

/// A candidate as returned by discovery, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "website")]
    pub url: String,
}

impl CandidateRecord {
    /// Create a new record.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Request body that starts an agent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskRequest {
    pub url: String,
    pub goal: String,
}
