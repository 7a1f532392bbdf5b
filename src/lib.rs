pub mod audio;
pub mod broker;
pub mod client;
pub mod config;
pub mod http;
pub mod i18n;
pub mod live;
pub mod prompt;
pub mod protocol;

pub use audio::{AudioBackend, AudioBackendConfig, AudioFile, AudioFrame, CaptureRecorder, FileBackend, WavSpec};
pub use broker::{BrokerSettings, TurnBroker, TurnError, VoiceTurnResult};
pub use client::{ControllerConfig, VoiceController, VoiceError, VoiceSnapshot, VoiceState};
pub use config::Config;
pub use http::{create_router, AppState};
pub use i18n::Locale;
pub use live::{GeminiLiveConnector, LiveConnector, LiveEvent, LiveSession};
pub use protocol::{SpeakerProfile, TurnResponse, VoiceTurnRequest};
