//! Client implementations of the service traits.
//!
//! [`HttpDiscoveryClient`] and [`HttpAgentClient`] talk JSON over HTTP;
//! [`StaticDiscovery`] returns a fixed list and is handy when the targets
//! are already known.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info};

use fanout_core::Candidate;

use crate::error::SdkError;
use crate::service::{AgentService, ByteStream, DiscoveryService};
use crate::types::{AgentTaskRequest, CandidateRecord, DiscoveryRequest, DiscoveryResponse};

/// Discovery over HTTP: `POST {query}` returning `{candidates: [...]}`.
pub struct HttpDiscoveryClient {
    inner: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDiscoveryClient {
    /// Create a new client for the given endpoint URL.
    pub fn new(endpoint: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send a bearer token with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl DiscoveryService for HttpDiscoveryClient {
    async fn discover(&self, query: &str) -> Result<Vec<CandidateRecord>, SdkError> {
        debug!(url = %self.endpoint, query_len = query.len(), "POST discovery");

        let mut request = self.inner.post(&self.endpoint).json(&DiscoveryRequest {
            query: query.to_string(),
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SdkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let parsed: DiscoveryResponse = serde_json::from_slice(&body)?;
        info!(count = parsed.candidates.len(), "Discovery returned candidates");
        Ok(parsed.candidates)
    }
}

/// Agent tasks over HTTP: `POST {url, goal}` answered with an SSE stream.
pub struct HttpAgentClient {
    inner: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAgentClient {
    /// Create a new client for the given endpoint URL.
    pub fn new(endpoint: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send a bearer token with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl AgentService for HttpAgentClient {
    async fn start_task(&self, candidate: &Candidate, goal: &str) -> Result<ByteStream, SdkError> {
        debug!(
            url = %self.endpoint,
            candidate = %candidate.id,
            target = %candidate.target_url,
            "POST agent task"
        );

        let mut request = self
            .inner
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(&AgentTaskRequest {
                url: candidate.target_url.clone(),
                goal: goal.to_string(),
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SdkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| SdkError::Transport(e.to_string())));
        Ok(Box::pin(stream))
    }
}

/// Discovery that always returns the same candidates.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    candidates: Vec<CandidateRecord>,
}

impl StaticDiscovery {
    /// Create a discovery service over a fixed list.
    pub fn new(candidates: Vec<CandidateRecord>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl DiscoveryService for StaticDiscovery {
    async fn discover(&self, _query: &str) -> Result<Vec<CandidateRecord>, SdkError> {
        Ok(self.candidates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = HttpAgentClient::new("http://localhost:8080/tasks/");
        assert_eq!(client.endpoint, "http://localhost:8080/tasks");

        let client = HttpDiscoveryClient::new("http://localhost:8080/discover//").with_api_key("k");
        assert_eq!(client.endpoint, "http://localhost:8080/discover");
        assert_eq!(client.api_key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_static_discovery_ignores_query() {
        let discovery = StaticDiscovery::new(vec![CandidateRecord::new("Acme", "https://acme.test")]);
        let found = discovery.discover("anything").await.unwrap();
        assert_eq!(found, vec![CandidateRecord::new("Acme", "https://acme.test")]);
    }
}
