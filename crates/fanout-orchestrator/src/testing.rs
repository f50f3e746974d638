//! Scripted discovery and agent services for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use serde_json::Value;

use fanout_agent_sdk::{AgentService, ByteStream, CandidateRecord, DiscoveryService, SdkError};
use fanout_core::Candidate;

/// Discovery that returns a fixed answer.
pub struct ScriptedDiscovery {
    answer: Result<Vec<CandidateRecord>, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedDiscovery {
    pub fn records(records: Vec<CandidateRecord>) -> Self {
        Self {
            answer: Ok(records),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// `n` distinct candidates named C0..Cn.
    pub fn numbered(n: usize) -> Self {
        Self::records(
            (0..n)
                .map(|i| CandidateRecord::new(format!("C{}", i), format!("https://c{}.test", i)))
                .collect(),
        )
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoveryService for ScriptedDiscovery {
    async fn discover(&self, _query: &str) -> Result<Vec<CandidateRecord>, SdkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.answer {
            Ok(records) => Ok(records.clone()),
            Err(message) => Err(SdkError::Transport(message.clone())),
        }
    }
}

/// What a scripted stream does after its last chunk.
#[derive(Debug, Clone)]
pub enum Tail {
    /// Close the stream.
    End,
    /// Never yield again.
    Hang,
    /// Yield a transport error.
    Error(String),
}

/// Behaviour of one agent task.
#[derive(Debug, Clone)]
pub struct Script {
    pub open_delay: Duration,
    pub open_error: Option<String>,
    pub chunks: Vec<(Duration, Vec<u8>)>,
    pub tail: Tail,
}

impl Script {
    pub fn new() -> Self {
        Self {
            open_delay: Duration::ZERO,
            open_error: None,
            chunks: Vec::new(),
            tail: Tail::End,
        }
    }

    pub fn refuse(message: &str) -> Self {
        Self {
            open_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Send one SSE frame after `delay`.
    pub fn event(mut self, delay: Duration, event: Value) -> Self {
        self.chunks.push((delay, frame(&event)));
        self
    }

    /// Send raw bytes after `delay`.
    pub fn raw(mut self, delay: Duration, bytes: &[u8]) -> Self {
        self.chunks.push((delay, bytes.to_vec()));
        self
    }

    pub fn then(mut self, tail: Tail) -> Self {
        self.tail = tail;
        self
    }
}

/// Encode an event as an SSE data frame.
pub fn frame(event: &Value) -> Vec<u8> {
    format!("data: {}\n\n", event).into_bytes()
}

/// Agent service that plays back a [`Script`] per candidate url.
#[derive(Default)]
pub struct ScriptedAgent {
    scripts: Mutex<HashMap<String, Script>>,
    goals: Mutex<Vec<(String, String)>>,
    started: AtomicUsize,
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), script);
        self
    }

    /// Number of `start_task` calls.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of streams handed out.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of streams that were dropped or ran out.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Goals received, as (url, goal).
    pub fn goals(&self) -> Vec<(String, String)> {
        self.goals.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentService for ScriptedAgent {
    async fn start_task(&self, candidate: &Candidate, goal: &str) -> Result<ByteStream, SdkError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.goals
            .lock()
            .unwrap()
            .push((candidate.target_url.clone(), goal.to_string()));

        let script = self
            .scripts
            .lock()
            .unwrap()
            .remove(&candidate.target_url)
            .unwrap_or_else(|| Script::new().then(Tail::Hang));

        if !script.open_delay.is_zero() {
            tokio::time::sleep(script.open_delay).await;
        }
        if let Some(message) = script.open_error {
            return Err(SdkError::Status {
                status: 503,
                body: message,
            });
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(playback(script.chunks, script.tail, self.released.clone()))
    }
}

struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn playback(chunks: Vec<(Duration, Vec<u8>)>, tail: Tail, released: Arc<AtomicUsize>) -> ByteStream {
    let state = (VecDeque::from(chunks), Some(tail), ReleaseGuard(released));
    Box::pin(stream::unfold(state, |(mut chunks, tail, guard)| async move {
        if let Some((delay, bytes)) = chunks.pop_front() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            return Some((Ok(Bytes::from(bytes)), (chunks, tail, guard)));
        }
        match tail? {
            Tail::End => None,
            Tail::Hang => {
                std::future::pending::<()>().await;
                None
            }
            Tail::Error(message) => Some((Err(SdkError::Transport(message)), (chunks, None, guard))),
        }
    }))
}
