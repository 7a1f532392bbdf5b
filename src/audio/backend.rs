use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::file::AudioFile;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate the upstream model expects
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // Live API input rate
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

/// Audio capture backend trait
///
/// Platform microphone stacks implement this; `FileBackend` replays a WAV
/// file for batch use and tests.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Replays a WAV file as a stream of frames
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    /// Sleep one buffer duration between frames
    paced: bool,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            paced: false,
            task: None,
        }
    }

    /// Emit frames at real-time pace instead of as fast as possible
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            bail!("Already capturing");
        }

        let audio = AudioFile::open(&self.path)?;
        let channels = audio.channels.max(1);
        let samples_per_frame = ((audio.sample_rate as u64 * self.config.buffer_duration_ms
            / 1000) as usize
            * channels as usize)
            .max(channels as usize);
        let frame_ms = self.config.buffer_duration_ms;
        let paced = self.paced;

        info!(
            "Replaying {} ({}Hz, {} channels) in {}ms frames",
            audio.path, audio.sample_rate, channels, frame_ms
        );

        let (tx, rx) = mpsc::channel(100);
        let task = tokio::spawn(async move {
            for (i, samples) in audio.samples.chunks(samples_per_frame).enumerate() {
                let frame = AudioFrame {
                    samples: samples.to_vec(),
                    sample_rate: audio.sample_rate,
                    channels,
                    timestamp_ms: i as u64 * frame_ms,
                };
                if tx.send(frame).await.is_err() {
                    debug!("Frame receiver dropped, stopping replay");
                    break;
                }
                if paced {
                    tokio::time::sleep(Duration::from_millis(frame_ms)).await;
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "WAV file replay"
    }
}
