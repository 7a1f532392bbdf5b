//! User-facing voice messages in the supported locales.

use serde::{Deserialize, Serialize};

/// Supported interface locales
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

/// Message keys surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    PermissionDenied,
    RecordingFailed,
    NoRecording,
    ConnectionProblem,
    PlaybackFailed,
    Apology,
}

impl Locale {
    pub fn message(self, key: MessageKey) -> &'static str {
        use MessageKey::*;
        match (self, key) {
            (Locale::Es, PermissionDenied) => {
                "Necesito permiso para usar el micrófono. Puede activarlo en los ajustes del teléfono."
            }
            (Locale::Es, RecordingFailed) => "No pude empezar a grabar. Inténtelo de nuevo, por favor.",
            (Locale::Es, NoRecording) => "No encontré ninguna grabación. Inténtelo de nuevo, por favor.",
            (Locale::Es, ConnectionProblem) => {
                "Hay un problema de conexión. Compruebe su internet e inténtelo de nuevo."
            }
            (Locale::Es, PlaybackFailed) => "No pude reproducir la respuesta. Inténtelo de nuevo, por favor.",
            (Locale::Es, Apology) => "Lo siento, no pude responder esta vez. ¿Puede repetirlo, por favor?",

            (Locale::En, PermissionDenied) => {
                "I need permission to use the microphone. You can turn it on in your phone settings."
            }
            (Locale::En, RecordingFailed) => "I couldn't start recording. Please try again.",
            (Locale::En, NoRecording) => "I couldn't find a recording. Please try again.",
            (Locale::En, ConnectionProblem) => {
                "There is a connection problem. Please check your internet and try again."
            }
            (Locale::En, PlaybackFailed) => "I couldn't play the answer. Please try again.",
            (Locale::En, Apology) => "Sorry, I couldn't answer this time. Could you say that again?",
        }
    }

    /// Language name as written in model instructions
    pub fn language_name(self) -> &'static str {
        match self {
            Locale::Es => "Spanish",
            Locale::En => "English",
        }
    }
}
