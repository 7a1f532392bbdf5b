pub mod backend;
pub mod capture;
pub mod file;
pub mod pcm;
pub mod wav;

pub use backend::{AudioBackend, AudioBackendConfig, AudioFrame, FileBackend};
pub use capture::{CaptureRecorder, RecordingMetadata};
pub use file::AudioFile;
pub use wav::WavSpec;
