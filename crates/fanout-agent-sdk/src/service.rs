//! Service traits consumed by the orchestrator.
//!
//! Implement these to plug in a different discovery backend or agent
//! provider. The HTTP clients in [`crate::client`] are the stock ones.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use fanout_core::Candidate;

use crate::error::SdkError;
use crate::types::CandidateRecord;

/// Raw SSE bytes from an agent task.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, SdkError>> + Send>>;

/// Produces candidate targets for a query.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Return candidates in display order.
    async fn discover(&self, query: &str) -> Result<Vec<CandidateRecord>, SdkError>;
}

/// Starts remote agent tasks.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Start one task against `candidate` and return its event byte stream.
    ///
    /// Dropping the stream aborts the task's transport.
    async fn start_task(&self, candidate: &Candidate, goal: &str) -> Result<ByteStream, SdkError>;
}
