//! Re-framing of the upstream event stream into chat-completion chunks.
//!
//! The upstream sends `event: <name>` and `data: <json>` lines separated by
//! blank lines. The client expects a flat run of `data: <chunk>` frames closed
//! by `data: [DONE]`. [`LineBuffer`] turns raw body bytes into lines,
//! [`StreamTranslator`] maps lines to chunks, and [`pump`] drives both against
//! a live body and a response channel.

use std::convert::Infallible;

use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use msgbridge_protocol::client::ChunkChoice;
use msgbridge_protocol::client::ChunkDelta;
use msgbridge_protocol::client::ClientRole;
use msgbridge_protocol::client::ClientStreamChunk;
use msgbridge_protocol::client::FinishReason;
use msgbridge_protocol::upstream::StreamDelta;
use msgbridge_protocol::upstream::StreamEvent;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::error::GatewayError;
use crate::error::Result;

const EVENT_MESSAGE_START: &str = "message_start";
const EVENT_MESSAGE_STOP: &str = "message_stop";

/// Accumulates body bytes and yields complete lines. A line may be split
/// across any number of network chunks, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = memchr::memchr(b'\n', &self.buf[start..]) {
            let end = start + pos;
            lines.push(String::from_utf8_lossy(&self.buf[start..end]).into_owned());
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Returns the trailing unterminated line, if any, at end of input.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    AwaitingStart,
    Streaming,
    Done,
}

#[derive(Debug, PartialEq, Eq)]
enum UpstreamLine<'a> {
    Event(&'a str),
    Data(&'a str),
    Other,
}

fn classify(line: &str) -> UpstreamLine<'_> {
    let line = line.trim();
    if let Some(name) = line.strip_prefix("event:") {
        UpstreamLine::Event(name.trim())
    } else if let Some(payload) = line.strip_prefix("data:") {
        UpstreamLine::Data(payload.trim())
    } else {
        UpstreamLine::Other
    }
}

/// State machine for one streamed exchange.
///
/// The chunk `id` and `created` timestamp are fixed at construction and
/// shared by every chunk the translator emits.
#[derive(Debug)]
pub struct StreamTranslator {
    id: String,
    created: i64,
    model: String,
    state: StreamState,
    text: String,
}

impl StreamTranslator {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_identity(crate::new_completion_id(), crate::unix_now(), model)
    }

    pub fn with_identity(id: impl Into<String>, created: i64, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created,
            model: model.into(),
            state: StreamState::AwaitingStart,
            text: String::new(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == StreamState::Done
    }

    /// All assistant text seen so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Feeds one upstream line and returns the chunk it produces, if any.
    pub fn push_line(&mut self, line: &str) -> Option<ClientStreamChunk> {
        let line = classify(line);
        match (self.state, line) {
            (StreamState::AwaitingStart, UpstreamLine::Event(EVENT_MESSAGE_START)) => {
                self.state = StreamState::Streaming;
                Some(self.chunk(
                    ChunkDelta {
                        role: Some(ClientRole::Assistant),
                        content: None,
                    },
                    None,
                ))
            }
            (StreamState::Streaming, UpstreamLine::Data(payload)) => {
                let text = text_delta(payload)?;
                self.text.push_str(&text);
                Some(self.chunk(
                    ChunkDelta {
                        role: None,
                        content: Some(text),
                    },
                    None,
                ))
            }
            (StreamState::Streaming, UpstreamLine::Event(EVENT_MESSAGE_STOP)) => {
                self.state = StreamState::Done;
                Some(self.chunk(ChunkDelta::default(), Some(FinishReason::Stop)))
            }
            _ => None,
        }
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<FinishReason>) -> ClientStreamChunk {
        ClientStreamChunk {
            id: self.id.clone(),
            object: ClientStreamChunk::OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

/// Text carried by a `content_block_delta`/`text_delta` payload. Any other
/// payload, including one that is not valid JSON, yields `None`.
fn text_delta(payload: &str) -> Option<String> {
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(StreamEvent::ContentBlockDelta {
            delta: StreamDelta::TextDelta { text },
        }) => Some(text),
        Ok(_) => None,
        Err(e) => {
            debug!("skipping undecodable stream payload: {e}");
            None
        }
    }
}

/// Encodes one chunk as a client `data:` frame.
pub fn encode_chunk(chunk: &ClientStreamChunk) -> std::result::Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(chunk)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

pub fn done_frame() -> Bytes {
    Bytes::from(format!("data: {}\n\n", ClientStreamChunk::DONE_SENTINEL))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `message_stop` was seen and the sentinel was sent.
    Completed { chunks: usize, text_len: usize },
    /// The response channel closed before the stream finished.
    ClientDisconnected,
}

/// Copies `upstream` into `tx`, translating as it goes.
///
/// Every chunk is sent as its own frame so the HTTP layer can flush it right
/// away. Reading stops as soon as the receiving side of `tx` is dropped,
/// which releases the upstream connection. A read error or end of input
/// before `message_stop` is reported as
/// [`GatewayError::UpstreamStreamTruncated`]; frames already sent stay sent.
pub async fn pump<S, E>(
    upstream: S,
    mut translator: StreamTranslator,
    tx: mpsc::Sender<std::result::Result<Bytes, Infallible>>,
) -> Result<StreamOutcome>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    tokio::pin!(upstream);
    let mut lines = LineBuffer::default();
    let mut chunks = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => {
                debug!("client went away; dropping upstream stream");
                return Ok(StreamOutcome::ClientDisconnected);
            }
            next = upstream.next() => next,
        };

        let (pending, eof) = match next {
            Some(Ok(bytes)) => (lines.push(&bytes), false),
            Some(Err(e)) => {
                warn!("reading upstream stream failed: {e}");
                return Err(GatewayError::UpstreamStreamTruncated);
            }
            None => (lines.finish().into_iter().collect(), true),
        };

        for line in pending {
            trace!("upstream line: {line}");
            let Some(chunk) = translator.push_line(&line) else {
                continue;
            };
            match encode_chunk(&chunk) {
                Ok(frame) => {
                    if tx.send(Ok(frame)).await.is_err() {
                        return Ok(StreamOutcome::ClientDisconnected);
                    }
                    chunks += 1;
                }
                Err(e) => error!("failed to encode stream chunk: {e}"),
            }
            if translator.is_done() {
                if tx.send(Ok(done_frame())).await.is_err() {
                    return Ok(StreamOutcome::ClientDisconnected);
                }
                return Ok(StreamOutcome::Completed {
                    chunks,
                    text_len: translator.text().len(),
                });
            }
        }

        if eof {
            warn!(
                state = ?translator.state(),
                chunks,
                "upstream stream ended before message_stop"
            );
            return Err(GatewayError::UpstreamStreamTruncated);
        }
    }
}
