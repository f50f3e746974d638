//! Error types for the agent SDK.

use thiserror::Error;

/// Errors that can occur talking to the discovery or agent services.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The event stream broke while reading.
    #[error("Transport error: {0}")]
    Transport(String),
}
