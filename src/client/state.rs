use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the voice interaction currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
}

/// Everything a screen needs to render the voice UI
#[derive(Debug, Clone, Default, Serialize)]
pub struct VoiceSnapshot {
    pub state: VoiceState,
    /// Latest reply text from the tutor
    pub transcript: Option<String>,
    /// Localized message of the last failure, cleared by the next attempt
    pub error: Option<String>,
    /// When `state` last changed
    pub changed_at: DateTime<Utc>,
}
