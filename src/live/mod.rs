//! Upstream "live" conversational audio sessions.
//!
//! A session is opened per turn, fed one input, and then read as a single
//! stream of `LiveEvent`s until the turn completes or the stream closes:
//! - `LiveConnector::open` - open a session with a system instruction
//! - `LiveSession::send_*` - realtime audio plus end marker, or one text turn
//! - `LiveSession::next_event` - tagged events, `Closed` once exhausted

mod gemini;
mod messages;

use anyhow::Result;
use async_trait::async_trait;

pub use gemini::{GeminiLiveConnector, GeminiSettings};
pub use messages::ServerMessage;

/// Event emitted by an upstream session during a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Base64-encoded PCM fragment of the spoken reply
    AudioChunk(String),
    /// Text fragment (model text part or output transcription)
    TextChunk(String),
    /// The model finished its turn
    TurnComplete,
    /// Upstream reported an error
    Error(String),
    /// The stream ended; every later call returns `Closed` again
    Closed,
}

/// Reply modalities requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Audio,
    Text,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Audio => "AUDIO",
            Modality::Text => "TEXT",
        }
    }
}

/// Per-session configuration sent before the turn begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    pub system_instruction: String,
    pub response_modalities: Vec<Modality>,
}

/// Opens upstream sessions; shared read-only across requests
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn open(&self, setup: &SessionSetup) -> Result<Box<dyn LiveSession>>;
}

/// One ephemeral upstream session, owned by a single turn
#[async_trait]
pub trait LiveSession: Send {
    /// Stream captured 16-bit mono PCM
    async fn send_realtime_audio(&mut self, pcm: &[u8], sample_rate: u32) -> Result<()>;

    /// Mark the end of the user's audio so the model replies
    async fn send_turn_complete(&mut self) -> Result<()>;

    /// Send a complete text turn
    async fn send_text_turn(&mut self, text: &str) -> Result<()>;

    /// Next event of the reply stream
    async fn next_event(&mut self) -> LiveEvent;

    /// Tear the session down; safe to call more than once
    async fn close(&mut self) -> Result<()>;
}
