//! Request and response types shared by the broker and the client.
//!
//! Wire bodies use camelCase field names; the in-memory `VoiceTurnRequest`
//! is what both ends actually work with.

use serde::{Deserialize, Serialize};

use crate::audio::pcm;

pub const VOICE_TURN_PATH: &str = "/api/live/voice-turn";
pub const VOICE_TEXT_PATH: &str = "/api/live/voice-text";

/// MIME type of the combined reply audio
pub const REPLY_MIME_TYPE: &str = "audio/wav";

/// Grammatical gender used to steer phrasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Who is speaking; used only to steer the reply's phrasing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerProfile {
    pub name: Option<String>,
    pub gender: Option<Gender>,
}

/// What the user said
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPayload {
    /// Captured audio: raw 16-bit PCM or a WAV container
    Audio(Vec<u8>),
    Text(String),
}

/// One user utterance or typed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTurnRequest {
    pub payload: TurnPayload,
    pub profile: SpeakerProfile,
    pub context: Option<String>,
}

impl VoiceTurnRequest {
    pub fn audio(bytes: Vec<u8>, profile: SpeakerProfile, context: Option<String>) -> Self {
        Self {
            payload: TurnPayload::Audio(bytes),
            profile,
            context,
        }
    }

    pub fn text(text: impl Into<String>, profile: SpeakerProfile, context: Option<String>) -> Self {
        Self {
            payload: TurnPayload::Text(text.into()),
            profile,
            context,
        }
    }

    /// Endpoint path this request is posted to
    pub fn path(&self) -> &'static str {
        match self.payload {
            TurnPayload::Audio(_) => VOICE_TURN_PATH,
            TurnPayload::Text(_) => VOICE_TEXT_PATH,
        }
    }

    /// Wire body for this request
    pub fn to_body(&self) -> VoiceTurnBody {
        let (audio_base64, text) = match &self.payload {
            TurnPayload::Audio(bytes) => (Some(pcm::to_base64(bytes)), None),
            TurnPayload::Text(text) => (None, Some(text.clone())),
        };
        VoiceTurnBody {
            audio_base64,
            text,
            user_name: self.profile.name.clone(),
            user_gender: self.profile.gender,
            context: self.context.clone(),
        }
    }
}

/// Why a wire body could not become a request
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("audioBase64 is not valid base64: {0}")]
    InvalidAudio(#[from] base64::DecodeError),
}

/// Body of both endpoints; each reads its own primary field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceTurnBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_gender: Option<Gender>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl VoiceTurnBody {
    fn profile(&self) -> SpeakerProfile {
        SpeakerProfile {
            name: non_blank(self.user_name.as_deref()),
            gender: self.user_gender,
        }
    }

    /// Build an audio request (voice-turn endpoint)
    pub fn into_audio_request(self) -> Result<VoiceTurnRequest, BodyError> {
        let encoded = non_blank(self.audio_base64.as_deref()).ok_or(BodyError::Missing("audioBase64"))?;
        let bytes = pcm::from_base64(&encoded)?;
        if bytes.is_empty() {
            return Err(BodyError::Missing("audioBase64"));
        }
        Ok(VoiceTurnRequest::audio(
            bytes,
            self.profile(),
            non_blank(self.context.as_deref()),
        ))
    }

    /// Build a text request (voice-text endpoint)
    pub fn into_text_request(self) -> Result<VoiceTurnRequest, BodyError> {
        let text = non_blank(self.text.as_deref()).ok_or(BodyError::Missing("text"))?;
        Ok(VoiceTurnRequest::text(
            text,
            self.profile(),
            non_blank(self.context.as_deref()),
        ))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Response body of both endpoints
///
/// Success with audio sets `audioBase64`, `mimeType` and `success`; a
/// fallback sets `text` and `fallback`; a failure adds `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnResponse {
    /// Playable reply, optionally with its transcript
    pub fn audio(wav: &[u8], text: Option<String>) -> Self {
        Self {
            audio_base64: Some(pcm::to_base64(wav)),
            mime_type: Some(REPLY_MIME_TYPE.to_string()),
            text,
            success: Some(true),
            ..Default::default()
        }
    }

    /// No audio could be produced; text only
    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            fallback: true,
            ..Default::default()
        }
    }

    /// The turn failed; `text` is what the user should hear or read
    pub fn failure(error: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::fallback(text)
        }
    }
}
