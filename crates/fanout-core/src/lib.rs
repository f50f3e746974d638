//! Fanout Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtimes
//!
//! Task state changes go through [`TaskState::apply`]; run views are
//! aggregated with [`summarize`].

pub mod candidate;
pub mod error;
pub mod ids;
pub mod outcome;
pub mod run;
pub mod status;
pub mod summary;
pub mod task;

// Re-export commonly used types
pub use candidate::Candidate;
pub use error::CoreError;
pub use ids::{CandidateId, RunId};
pub use outcome::{Outcome, OutcomeSource};
pub use run::{RunSnapshot, TaskEntry};
pub use status::{RunPhase, TaskStatus};
pub use summary::{summarize, RunSummary, SummaryCounts};
pub use task::{TaskState, TaskUpdate, Transition};
