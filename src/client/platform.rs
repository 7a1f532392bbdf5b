// Platform seams of the voice controller.
//
// Mobile and desktop audio stacks implement these; the controller never
// touches a microphone or speaker directly.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lazily requested microphone access
#[async_trait]
pub trait MicrophonePermission: Send + Sync {
    /// Ask for (or confirm) access; `Ok(false)` means the user declined
    async fn request(&self) -> Result<bool>;
}

/// Captures one utterance at a time
#[async_trait]
pub trait Recorder: Send + Sync {
    async fn start(&self) -> Result<()>;

    /// Finalize the recording; `None` when nothing was captured
    async fn stop(&self) -> Result<Option<PathBuf>>;

    fn is_recording(&self) -> bool;
}

/// Plays reply audio files
#[async_trait]
pub trait Player: Send + Sync {
    async fn play(&self, path: &Path) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    fn is_playing(&self) -> bool;

    /// Resolve once playback is over
    ///
    /// Polls `is_playing` by default; players with a native completion
    /// event should override this.
    async fn wait_finished(&self, poll_interval: Duration) {
        while self.is_playing() {
            tokio::time::sleep(poll_interval).await;
        }
    }
}
