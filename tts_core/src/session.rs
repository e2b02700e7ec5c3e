//! Realtime synthesis session contract.
//!
//! A [`SessionConnector`] opens one [`SynthesisSession`] per request. The
//! session is driven strictly in order:
//!
//! `Created -> Opened -> Configured -> Streaming -> Finished -> Closed`
//!
//! with `Error` reachable from any state after `Opened`. Calling an operation
//! out of order is a caller bug and is only checked by debug assertions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::events::EventSink;
use crate::TtsResult;

/// Output audio format requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Wire name of the encoding (`response_format`).
    pub format: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub const PCM_24000HZ_MONO_16BIT: AudioFormat = AudioFormat {
        format: "pcm",
        sample_rate: 24000,
        channels: 1,
        bits_per_sample: 16,
    };

    /// Bytes per second of audio in this format.
    pub fn byte_rate(&self) -> u32 {
        let rate = self.sample_rate as u64 * self.channels as u64 * self.bits_per_sample as u64 / 8;
        u32::try_from(rate).unwrap_or(u32::MAX)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::PCM_24000HZ_MONO_16BIT
    }
}

/// Who decides when buffered text is synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// The provider segments and commits the text buffer itself.
    #[default]
    ServerCommit,
    /// The client commits the text buffer before finishing.
    Commit,
}

impl CommitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitMode::ServerCommit => "server_commit",
            CommitMode::Commit => "commit",
        }
    }
}

/// Parameters sent once per session, right after it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub voice: String,
    pub response_format: AudioFormat,
    pub mode: CommitMode,
    pub language_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Opened,
    Configured,
    Streaming,
    Finished,
    Closed,
    Error,
}

impl SessionState {
    pub fn can_append(&self) -> bool {
        matches!(self, SessionState::Configured | SessionState::Streaming)
    }

    pub fn can_finish(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }
}

/// One live realtime exchange.
#[async_trait]
pub trait SynthesisSession: Send {
    /// Send session parameters. Exactly once, before any text.
    async fn configure(&mut self, params: &SessionParams) -> TtsResult<()>;

    /// Send one slice of input text. Slices must respect the caller's bound.
    async fn append_text(&mut self, text: &str) -> TtsResult<()>;

    /// Signal end of input.
    async fn finish(&mut self) -> TtsResult<()>;

    /// Release the connection. Idempotent.
    async fn close(&mut self);

    fn state(&self) -> SessionState;
}

/// Opens sessions against a realtime endpoint. Events of the opened session
/// are delivered to `sink` until the connection ends.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(&self, model: &str, sink: Arc<dyn EventSink>) -> TtsResult<Box<dyn SynthesisSession>>;
}
