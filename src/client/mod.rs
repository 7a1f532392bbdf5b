//! Client voice state machine
//!
//! `VoiceController` is the whole integration surface for a screen:
//! `state`, `transcript`, `error`, `start_listening`, `stop_listening`,
//! `send_text_message`, `cancel`. Platform audio and networking plug in
//! through the traits in `platform` and `transport`.

mod controller;
mod error;
mod platform;
mod state;
mod transport;

pub use controller::{ControllerConfig, VoiceController};
pub use error::VoiceError;
pub use platform::{MicrophonePermission, Player, Recorder};
pub use state::{VoiceSnapshot, VoiceState};
pub use transport::{HttpTransport, TurnTransport};
