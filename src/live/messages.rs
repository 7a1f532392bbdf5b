// Wire messages of the Gemini Live BidiGenerateContent WebSocket protocol.
//
// Only the fields this crate reads or writes are modeled; unknown fields in
// server messages are ignored by serde.

use serde::{Deserialize, Serialize};

use super::LiveEvent;

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

impl Content {
    pub fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
                inline_data: None,
            }],
        }
    }
}

// ============================================================================
// Client -> server
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified, e.g. "models/gemini-2.0-flash-live-001"
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    /// Empty object enables transcription of the spoken reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<EmptyConfig>,
}

#[derive(Debug, Default, Serialize)]
pub struct EmptyConfig {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContentMessage {
    pub client_content: ClientContent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

// ============================================================================
// Server -> client
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,

    #[serde(default)]
    pub server_content: Option<ServerContent>,

    #[serde(default)]
    pub go_away: Option<serde_json::Value>,

    #[serde(default)]
    pub error: Option<ServerError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,

    #[serde(default)]
    pub turn_complete: Option<bool>,

    #[serde(default)]
    pub interrupted: Option<bool>,

    #[serde(default)]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Flatten into events, preserving part order
    pub fn into_events(self) -> Vec<LiveEvent> {
        let mut events = Vec::new();

        if let Some(err) = self.error {
            let message = err.message.unwrap_or_else(|| "unknown upstream error".to_string());
            events.push(LiveEvent::Error(match err.code {
                Some(code) => format!("{}: {}", code, message),
                None => message,
            }));
        }

        if let Some(content) = self.server_content {
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(blob) = part.inline_data {
                        if blob.mime_type.starts_with("audio/") {
                            events.push(LiveEvent::AudioChunk(blob.data));
                        }
                    }
                    if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                        events.push(LiveEvent::TextChunk(text));
                    }
                }
            }

            if let Some(text) = content
                .output_transcription
                .and_then(|t| t.text)
                .filter(|t| !t.is_empty())
            {
                events.push(LiveEvent::TextChunk(text));
            }

            if content.turn_complete.unwrap_or(false) {
                events.push(LiveEvent::TurnComplete);
            }
        }

        events
    }
}
