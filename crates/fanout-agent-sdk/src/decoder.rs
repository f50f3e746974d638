//! Event frame decoding for agent SSE streams.
//!
//! Chunks arrive with arbitrary boundaries. Bytes are buffered until a
//! newline completes a line; only `data:` lines carrying a parseable JSON
//! event are emitted. Everything else is dropped without failing the stream:
//!
//! ```text
//! data: {"type":"progress","message":"Opening site"}
//!
//! data: {"type":"complete","result":{"available":true}}
//! ```

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use tracing::{debug, trace};

use crate::error::SdkError;
use crate::types::AgentEvent;

/// Literal prefix of a data record.
pub const DATA_PREFIX: &str = "data:";

/// Longest line kept while waiting for its newline.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Incremental line decoder. Holds at most one incomplete line.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline.
    scanned: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
}

impl EventDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the events completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<AgentEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            if self.discarding {
                self.discarding = false;
            } else if let Some(event) = decode_line(&self.buffer[start..end]) {
                events.push(event);
            }
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.discarding || self.buffer.len() > MAX_LINE_LEN {
            if !self.discarding {
                trace!(len = self.buffer.len(), "Dropping oversized line");
            }
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }

        events
    }

    /// Number of buffered bytes waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode a single line (without its newline).
///
/// Returns `None` for non-data lines and for data lines that do not parse.
pub fn decode_line(line: &[u8]) -> Option<AgentEvent> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = std::str::from_utf8(line).ok()?;
    let payload = text.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    match serde_json::from_str::<AgentEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!(error = %e, len = payload.len(), "Dropping unparseable data line");
            None
        }
    }
}

struct DecodeState<S> {
    inner: S,
    decoder: EventDecoder,
    pending: VecDeque<AgentEvent>,
    done: bool,
}

/// Turn a byte stream into a lazy stream of agent events.
///
/// A transport error is yielded once and ends the stream. An unterminated
/// trailing line at end of stream is discarded.
pub fn decode_stream<S>(bytes: S) -> impl Stream<Item = Result<AgentEvent, SdkError>> + Send
where
    S: Stream<Item = Result<Bytes, SdkError>> + Send + Unpin + 'static,
{
    let state = DecodeState {
        inner: bytes,
        decoder: EventDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    let leftover = state.decoder.pending_len();
                    if leftover > 0 {
                        debug!(bytes = leftover, "Discarding unterminated trailing line");
                    }
                }
            }
        }
    })
}
