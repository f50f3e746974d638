//! Agent SDK for Fanout
//!
//! Talks to the two external collaborators of a run: the discovery service
//! that proposes candidates, and the agent service that streams task events
//! as Server-Sent-Event frames.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use fanout_agent_sdk::{decode_stream, AgentService, HttpAgentClient};
//! use fanout_core::{Candidate, CandidateId};
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = HttpAgentClient::new("http://localhost:8080/tasks");
//!     let candidate = Candidate::new(CandidateId::new("0-acme"), "Acme", "https://acme.test")?;
//!
//!     let bytes = agent.start_task(&candidate, "Check opening hours").await?;
//!     let mut events = Box::pin(decode_stream(bytes));
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event?);
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod decoder;
mod error;
mod service;
mod types;

// Re-export main types
pub use client::{HttpAgentClient, HttpDiscoveryClient, StaticDiscovery};
pub use decoder::{decode_line, decode_stream, EventDecoder, DATA_PREFIX, MAX_LINE_LEN};
pub use error::SdkError;
pub use service::{AgentService, ByteStream, DiscoveryService};
pub use types::{AgentEvent, AgentTaskRequest, CandidateRecord, DiscoveryRequest, DiscoveryResponse};
