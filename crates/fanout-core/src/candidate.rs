//! Discovered candidate targets.

use serde::{Deserialize, Serialize};

use crate::{CandidateId, CoreError};

/// One discovered target to be checked independently by a remote agent.
///
/// Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique id within a run.
    pub id: CandidateId,

    /// Human-readable name shown to the user.
    pub display_name: String,

    /// URL the agent is pointed at.
    pub target_url: String,
}

impl Candidate {
    /// Create a new Candidate, rejecting blank names or URLs.
    pub fn new(
        id: CandidateId,
        display_name: impl Into<String>,
        target_url: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let display_name = display_name.into().trim().to_string();
        let target_url = target_url.into().trim().to_string();

        if display_name.is_empty() {
            return Err(CoreError::InvalidCandidate(format!(
                "candidate '{}' has no name",
                id
            )));
        }
        if target_url.is_empty() {
            return Err(CoreError::InvalidCandidate(format!(
                "candidate '{}' has no url",
                display_name
            )));
        }

        Ok(Self {
            id,
            display_name,
            target_url,
        })
    }
}
