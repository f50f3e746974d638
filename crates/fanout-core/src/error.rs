//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Fanout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A candidate was missing a required field.
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),
}
