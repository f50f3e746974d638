//! Structured results of completed candidate tasks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Candidate;

/// Where an [`Outcome`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    /// Parsed from the agent's completion payload.
    Agent,
    /// The completion payload was absent or unreadable.
    Fallback,
    /// Synthesized because the task deadline expired.
    TimedOut,
    /// Synthesized because the stream ended without a completion event.
    StreamEnded,
}

/// Result of a completed candidate task.
///
/// The payload is domain-specific; the core only looks at `available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the candidate is a usable lead.
    pub available: bool,

    /// Human-readable summary of the result.
    pub summary: Option<String>,

    /// Link the user should follow for this candidate.
    pub url: Option<String>,

    /// Raw structured payload from the agent, or `Null`.
    #[serde(default)]
    pub details: Value,

    /// How this outcome was produced.
    pub source: OutcomeSource,
}

impl Outcome {
    /// Build an outcome from an agent completion payload.
    ///
    /// Accepts an object, a JSON string holding an object, or plain text.
    /// Never fails: anything unreadable becomes [`Outcome::fallback`].
    pub fn from_agent_result(result: Option<&Value>, candidate: &Candidate) -> Self {
        match result {
            None | Some(Value::Null) => Self::fallback(candidate),
            Some(Value::Object(map)) => Self::from_object(map, candidate),
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Self::from_object(&map, candidate),
                _ => {
                    let text = text.trim();
                    let mut outcome = Self::fallback(candidate);
                    if !text.is_empty() {
                        outcome.summary = Some(text.to_string());
                    }
                    outcome
                }
            },
            Some(_) => Self::fallback(candidate),
        }
    }

    /// Default used when the agent finished but its result could not be read.
    pub fn fallback(candidate: &Candidate) -> Self {
        Self {
            available: true,
            summary: Some(format!(
                "The agent finished without a readable result for {}. Check {} directly.",
                candidate.display_name, candidate.target_url
            )),
            url: Some(candidate.target_url.clone()),
            details: Value::Null,
            source: OutcomeSource::Fallback,
        }
    }

    /// Outcome synthesized when a task runs out of time.
    ///
    /// Still counted as a lead: the user is sent to the candidate's own site.
    pub fn timed_out(candidate: &Candidate) -> Self {
        Self {
            available: true,
            summary: Some(format!(
                "Could not finish checking {} in time. Visit {} to check it yourself.",
                candidate.display_name, candidate.target_url
            )),
            url: Some(candidate.target_url.clone()),
            details: Value::Null,
            source: OutcomeSource::TimedOut,
        }
    }

    /// Outcome synthesized when the agent stream closes without a result.
    pub fn stream_ended(candidate: &Candidate) -> Self {
        Self {
            source: OutcomeSource::StreamEnded,
            ..Self::fallback(candidate)
        }
    }

    /// Returns true if the outcome was produced by the timeout.
    pub fn is_timed_out(&self) -> bool {
        self.source == OutcomeSource::TimedOut
    }

    fn from_object(map: &Map<String, Value>, candidate: &Candidate) -> Self {
        let available = ["available", "isAvailable", "is_available"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_bool))
            .unwrap_or(true);

        let summary = ["summary", "message", "details"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        let url = map
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(candidate.target_url.clone()));

        Self {
            available,
            summary,
            url,
            details: Value::Object(map.clone()),
            source: OutcomeSource::Agent,
        }
    }
}
