//! Streaming match sessions
//!
//! One session per client connection. Binary frames are WAV chunks that are
//! fingerprinted and matched on their own; text frames are control messages.
//! A bad message produces an error reply and leaves the session usable.

use crate::config::TuneTraceConfig;
use crate::error::{DecodeError, Result, TuneTraceError};
use crate::matching::{MatchResult, Matcher};
use crate::service_config::SessionConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Messages a client may send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// One WAV-container audio chunk
    Chunk(Vec<u8>),
    Ping,
    Ack,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ControlFrame {
    Ping,
    Ack,
}

impl ClientMessage {
    /// Parse a text frame: bare `ping`, or JSON `{"type": "ping" | "ack"}`
    pub fn from_text(text: &str) -> std::result::Result<Self, DecodeError> {
        let text = text.trim();
        if text == "ping" {
            return Ok(ClientMessage::Ping);
        }
        match serde_json::from_str::<ControlFrame>(text) {
            Ok(ControlFrame::Ping) => Ok(ClientMessage::Ping),
            Ok(ControlFrame::Ack) => Ok(ClientMessage::Ack),
            Err(e) => Err(DecodeError::InvalidMessage(e.to_string())),
        }
    }
}

/// Replies sent back to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Match {
        ok: bool,
        #[serde(rename = "match")]
        result: Option<MatchResult>,
    },
    Pong {
        ok: bool,
        /// Milliseconds since the Unix epoch
        pong: i64,
    },
    Error {
        ok: bool,
        error: String,
    },
}

impl ServerMessage {
    pub fn matched(result: Option<MatchResult>) -> Self {
        ServerMessage::Match { ok: true, result }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong {
            ok: true,
            pong: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            ok: false,
            error: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Only strings, integers and bools: serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"ok":false}"#.to_string())
    }
}

/// Per-connection state
pub struct StreamingSession {
    matcher: Arc<Matcher>,
    config: TuneTraceConfig,
    tail_samples: usize,
    tail: Vec<f32>,
    chunks: u64,
}

impl StreamingSession {
    pub fn new(matcher: Arc<Matcher>, config: TuneTraceConfig, options: &SessionConfig) -> Self {
        let tail_samples =
            (options.carry_tail_ms as u64 * config.target_sample_rate as u64 / 1000) as usize;
        Self {
            matcher,
            config,
            tail_samples,
            tail: Vec::new(),
            chunks: 0,
        }
    }

    /// Number of chunks processed successfully
    pub fn chunks_processed(&self) -> u64 {
        self.chunks
    }

    /// Handle one message; `None` means no reply is due
    pub async fn handle(&mut self, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::Ping => Some(ServerMessage::pong()),
            ClientMessage::Ack => None,
            ClientMessage::Chunk(bytes) => Some(match self.process_chunk(bytes).await {
                Ok(result) => ServerMessage::matched(result),
                Err(e) => {
                    log::warn!("Stream chunk rejected ({}): {}", e.code(), e);
                    ServerMessage::error(e.to_string())
                }
            }),
        }
    }

    /// Handle a text frame, replying with an error when it is not a known control message
    pub async fn handle_text(&mut self, text: &str) -> Option<ServerMessage> {
        match ClientMessage::from_text(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                log::warn!("Unrecognised control frame: {}", e);
                Some(ServerMessage::error(e.to_string()))
            }
        }
    }

    /// Fingerprint one chunk and match it
    pub async fn process_chunk(&mut self, bytes: Vec<u8>) -> Result<Option<MatchResult>> {
        let config = self.config.clone();
        let tail = std::mem::take(&mut self.tail);
        let tail_samples = self.tail_samples;

        let outcome = tokio::task::spawn_blocking(move || {
            let audio = match crate::audio::decode_audio(&bytes, config.target_sample_rate) {
                Ok(audio) => audio,
                Err(e) => return (tail, Err(TuneTraceError::from(e))),
            };

            let mut samples = tail;
            samples.extend_from_slice(&audio.samples);
            let postings = crate::fingerprint_samples(&samples, &config);

            let keep = samples.len().min(tail_samples);
            let next_tail = samples.split_off(samples.len() - keep);
            (next_tail, Ok(postings))
        })
        .await
        .map_err(|e| TuneTraceError::Task(e.to_string()))?;

        let (next_tail, postings) = outcome;
        self.tail = next_tail;
        let postings = postings?;

        let result = self.matcher.query(&postings).await?;
        self.chunks += 1;
        log::debug!(
            "Chunk {}: {} postings, match {:?}",
            self.chunks,
            postings.len(),
            result.as_ref().map(|m| (&m.track_id, m.confidence, m.delta_ms))
        );
        Ok(result)
    }
}
