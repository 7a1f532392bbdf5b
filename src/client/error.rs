use thiserror::Error;

use crate::i18n::MessageKey;

/// Failures of a voice interaction; every one of them ends in `Idle`
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("failed to start recording: {0:#}")]
    RecordingStart(anyhow::Error),

    #[error("failed to stop recording: {0:#}")]
    RecordingStop(anyhow::Error),

    #[error("no recording found")]
    NoRecording,

    #[error("could not read recording: {0:#}")]
    RecordingUnreadable(anyhow::Error),

    #[error("request failed: {0:#}")]
    Network(anyhow::Error),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("reply audio unusable: {0:#}")]
    ReplyAudio(anyhow::Error),

    #[error("playback failed: {0:#}")]
    Playback(anyhow::Error),
}

impl VoiceError {
    /// Message shown to the user
    pub fn message_key(&self) -> MessageKey {
        match self {
            VoiceError::PermissionDenied => MessageKey::PermissionDenied,
            VoiceError::RecordingStart(_) => MessageKey::RecordingFailed,
            VoiceError::RecordingStop(_)
            | VoiceError::NoRecording
            | VoiceError::RecordingUnreadable(_) => MessageKey::NoRecording,
            VoiceError::Network(_) | VoiceError::Server { .. } | VoiceError::ReplyAudio(_) => {
                MessageKey::ConnectionProblem
            }
            VoiceError::Playback(_) => MessageKey::PlaybackFailed,
        }
    }
}
