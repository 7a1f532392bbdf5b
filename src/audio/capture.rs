use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioFrame};
use crate::client::Recorder;

/// Metadata for a finished recording
#[derive(Debug, Clone)]
pub struct RecordingMetadata {
    /// File path to the recording
    pub file_path: PathBuf,
    /// Timestamp of the first frame in milliseconds
    pub start_ms: u64,
    /// Timestamp of the last frame in milliseconds
    pub end_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Number of samples written
    pub sample_count: usize,
}

/// Records one utterance at a time from an audio backend into a WAV file
///
/// Frames are written as they arrive; `stop` finalizes the file and hands
/// back its path. A capture that produced no frames yields no file.
pub struct CaptureRecorder {
    backend: Mutex<Box<dyn AudioBackend>>,
    output_dir: PathBuf,
    active: Mutex<Option<ActiveCapture>>,
    recording: AtomicBool,
}

struct ActiveCapture {
    file_path: PathBuf,
    task: JoinHandle<Result<Option<RecordingMetadata>>>,
}

impl CaptureRecorder {
    pub fn new(backend: Box<dyn AudioBackend>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        info!(
            "Capture recorder initialized: {} -> {}",
            backend.name(),
            output_dir.display()
        );

        Ok(Self {
            backend: Mutex::new(backend),
            output_dir,
            active: Mutex::new(None),
            recording: AtomicBool::new(false),
        })
    }

    /// Stop capturing and return the finished recording, if any frames arrived
    pub async fn finish(&self) -> Result<Option<RecordingMetadata>> {
        let active = self.active.lock().await.take();
        let Some(active) = active else {
            return Ok(None);
        };

        // Stopping the backend closes the frame channel, which ends the writer task
        if let Err(e) = self.backend.lock().await.stop().await {
            warn!("Failed to stop audio backend: {}", e);
        }
        self.recording.store(false, Ordering::SeqCst);

        let metadata = active
            .task
            .await
            .context("Recording task panicked")??;

        match &metadata {
            Some(meta) => info!(
                "Recording complete: {} ({:.1}s - {:.1}s, {} samples)",
                meta.file_path.display(),
                meta.start_ms as f64 / 1000.0,
                meta.end_ms as f64 / 1000.0,
                meta.sample_count
            ),
            None => warn!(
                "Recording produced no audio: {}",
                active.file_path.display()
            ),
        }

        Ok(metadata)
    }
}

#[async_trait::async_trait]
impl Recorder for CaptureRecorder {
    async fn start(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            bail!("Already recording");
        }

        let audio_rx = self
            .backend
            .lock()
            .await
            .start()
            .await
            .context("Failed to start audio capture")?;

        let file_path = self
            .output_dir
            .join(format!("utterance-{}.wav", uuid::Uuid::new_v4()));

        info!("Recording to {}", file_path.display());

        let task = tokio::spawn(write_frames(audio_rx, file_path.clone()));
        *active = Some(ActiveCapture { file_path, task });
        self.recording.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>> {
        Ok(self.finish().await?.map(|meta| meta.file_path))
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }
}

/// Drain frames into a WAV file, opened on the first frame
async fn write_frames(
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    file_path: PathBuf,
) -> Result<Option<RecordingMetadata>> {
    let mut writer: Option<WavFileWriter> = None;

    while let Some(frame) = audio_rx.recv().await {
        if writer.is_none() {
            writer = Some(WavFileWriter::create(
                file_path.clone(),
                frame.timestamp_ms,
                frame.sample_rate,
                frame.channels,
            )?);
        }

        if let Some(w) = &mut writer {
            if frame.sample_rate != w.metadata.sample_rate || frame.channels != w.metadata.channels {
                warn!(
                    "Frame format changed mid-recording ({}Hz/{}ch), dropping frame",
                    frame.sample_rate, frame.channels
                );
                continue;
            }
            w.write_frame(&frame)?;
        }
    }

    match writer {
        Some(w) => Ok(Some(w.finish()?)),
        None => Ok(None),
    }
}

/// Writes a single recording to disk as WAV file
struct WavFileWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    metadata: RecordingMetadata,
}

impl WavFileWriter {
    fn create(file_path: PathBuf, start_ms: u64, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&file_path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;

        Ok(Self {
            writer: Some(writer),
            metadata: RecordingMetadata {
                file_path,
                start_ms,
                end_ms: start_ms,
                sample_rate,
                channels,
                sample_count: 0,
            },
        })
    }

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            self.metadata.end_ms = frame.timestamp_ms;
            self.metadata.sample_count += frame.samples.len();
        }

        Ok(())
    }

    fn finish(mut self) -> Result<RecordingMetadata> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }

        Ok(self.metadata.clone())
    }
}

impl Drop for WavFileWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
