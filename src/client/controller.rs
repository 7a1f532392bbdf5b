use anyhow::{Context, Result};
use chrono::Utc;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::VoiceError;
use super::platform::{MicrophonePermission, Player, Recorder};
use super::state::{VoiceSnapshot, VoiceState};
use super::transport::TurnTransport;
use crate::audio::{pcm, wav, AudioFile, WavSpec};
use crate::i18n::Locale;
use crate::protocol::{SpeakerProfile, VoiceTurnRequest};

/// Upper bound on each teardown call made by `cancel`
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Behaviour of a voice controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Start listening again after the tutor finishes speaking
    pub auto_listen: bool,
    /// Grace period before re-listening so the mic does not catch the reply's tail
    pub relisten_delay: Duration,
    /// How often the default completion check looks at the player
    pub playback_poll_interval: Duration,
    pub locale: Locale,
    pub profile: SpeakerProfile,
    /// Where reply audio is written before playback
    pub scratch_dir: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            auto_listen: false,
            relisten_delay: Duration::from_millis(500),
            playback_poll_interval: Duration::from_millis(200),
            locale: Locale::default(),
            profile: SpeakerProfile::default(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Drives capture, upload, playback and re-listening for one screen
///
/// Public methods never return errors: failures land in the snapshot's
/// `error` field and the state falls back to `Idle`.
pub struct VoiceController {
    inner: Arc<Inner>,
}

struct Inner {
    config: ControllerConfig,
    permission: Arc<dyn MicrophonePermission>,
    recorder: Arc<dyn Recorder>,
    player: Arc<dyn Player>,
    transport: Arc<dyn TurnTransport>,
    snapshot: watch::Sender<VoiceSnapshot>,
    context: RwLock<Option<String>>,
    /// Cleared on unmount; nothing mutates state afterwards
    alive: AtomicBool,
    /// Set while `start_listening` is between its checks and `Listening`
    starting: AtomicBool,
    /// Bumped by `cancel`; work started under an older value is discarded
    generation: AtomicU64,
}

impl VoiceController {
    pub fn new(
        config: ControllerConfig,
        permission: Arc<dyn MicrophonePermission>,
        recorder: Arc<dyn Recorder>,
        player: Arc<dyn Player>,
        transport: Arc<dyn TurnTransport>,
    ) -> Self {
        let (snapshot, _) = watch::channel(VoiceSnapshot {
            changed_at: Utc::now(),
            ..Default::default()
        });

        Self {
            inner: Arc::new(Inner {
                config,
                permission,
                recorder,
                player,
                transport,
                snapshot,
                context: RwLock::new(None),
                alive: AtomicBool::new(true),
                starting: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> VoiceState {
        self.inner.current()
    }

    pub fn transcript(&self) -> Option<String> {
        self.inner.snapshot.borrow().transcript.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.snapshot.borrow().error.clone()
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Observe every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<VoiceSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Conversation context sent with subsequent turns
    pub fn set_context(&self, context: Option<String>) {
        if let Ok(mut guard) = self.inner.context.write() {
            *guard = context;
        }
    }

    /// `Idle` → `Listening`; a no-op from any other state
    pub async fn start_listening(&self) {
        self.inner.start_listening().await;
    }

    /// `Listening` → `Processing`, then on to `Speaking` or back to `Idle`
    pub async fn stop_listening(&self) {
        self.inner.stop_listening().await;
    }

    /// Typed message; only accepted from `Idle`
    pub async fn send_text_message(&self, text: &str) {
        self.inner.send_text_message(text).await;
    }

    /// Stop whatever is happening and return to `Idle`
    pub async fn cancel(&self) {
        self.inner.cancel().await;
    }

    /// Tear down for good; later calls are ignored
    pub async fn unmount(&self) {
        self.inner.cancel().await;
        self.inner.alive.store(false, Ordering::SeqCst);
        info!("Voice controller unmounted");
    }
}

impl Inner {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn current(&self) -> VoiceState {
        self.snapshot.borrow().state
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_stale(&self, generation: u64) -> bool {
        !self.is_alive() || self.generation() != generation
    }

    /// Atomically move `from` → `to`; false if the state was elsewhere
    fn transition(&self, from: VoiceState, to: VoiceState) -> bool {
        if !self.is_alive() {
            return false;
        }
        let moved = self.snapshot.send_if_modified(|snap| {
            if snap.state != from {
                return false;
            }
            snap.state = to;
            snap.changed_at = Utc::now();
            // A fresh attempt clears the previous failure
            if from == VoiceState::Idle {
                snap.error = None;
            }
            true
        });
        if moved {
            debug!("Voice state {:?} -> {:?}", from, to);
        }
        moved
    }

    fn force_idle(&self) {
        if !self.is_alive() {
            return;
        }
        self.snapshot.send_if_modified(|snap| {
            if snap.state == VoiceState::Idle {
                return false;
            }
            snap.state = VoiceState::Idle;
            snap.changed_at = Utc::now();
            true
        });
    }

    /// Single funnel for failures; ignored once `generation` is stale
    fn fail(&self, generation: u64, error: VoiceError) {
        if self.is_stale(generation) {
            debug!("Dropping failure of a cancelled interaction: {}", error);
            return;
        }
        warn!("Voice interaction failed: {}", error);
        let message = self.config.locale.message(error.message_key()).to_string();
        self.snapshot.send_modify(|snap| {
            snap.state = VoiceState::Idle;
            snap.error = Some(message);
            snap.changed_at = Utc::now();
        });
    }

    fn request_context(&self) -> Option<String> {
        self.context.read().ok().and_then(|c| c.clone())
    }

    async fn start_listening(&self) {
        if !self.is_alive() {
            return;
        }
        if self.current() != VoiceState::Idle {
            debug!("start_listening ignored in {:?}", self.current());
            return;
        }
        if self
            .starting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start_listening already in progress");
            return;
        }

        let generation = self.generation();
        let result = self.begin_capture().await;
        self.starting.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                if self.is_stale(generation) || !self.transition(VoiceState::Idle, VoiceState::Listening) {
                    debug!("Listening aborted while the recorder was starting");
                    self.discard_recording().await;
                    return;
                }
                info!("Listening");
            }
            Err(e) => self.fail(generation, e),
        }
    }

    async fn begin_capture(&self) -> Result<(), VoiceError> {
        match self.permission.request().await {
            Ok(true) => {}
            Ok(false) => return Err(VoiceError::PermissionDenied),
            Err(e) => {
                warn!("Microphone permission request failed: {:#}", e);
                return Err(VoiceError::PermissionDenied);
            }
        }

        self.recorder.start().await.map_err(VoiceError::RecordingStart)
    }

    async fn stop_listening(self: &Arc<Self>) {
        let generation = self.generation();

        // Claim the turn before finalizing so a second stop is a no-op
        if !self.transition(VoiceState::Listening, VoiceState::Processing) {
            debug!("stop_listening ignored in {:?}", self.current());
            return;
        }

        let stopped = self.recorder.stop().await;
        if self.is_stale(generation) {
            if let Ok(Some(path)) = &stopped {
                remove_quietly(path).await;
            }
            return;
        }

        let path = match stopped {
            Ok(Some(path)) => path,
            Ok(None) => return self.fail(generation, VoiceError::NoRecording),
            Err(e) => return self.fail(generation, VoiceError::RecordingStop(e)),
        };

        let audio = match load_recording(path.clone()).await {
            Ok(Some(audio)) => audio,
            Ok(None) => return self.fail(generation, VoiceError::NoRecording),
            Err(e) => return self.fail(generation, VoiceError::RecordingUnreadable(e)),
        };
        remove_quietly(&path).await;

        let request = VoiceTurnRequest::audio(
            audio,
            self.config.profile.clone(),
            self.request_context(),
        );
        self.run_turn(request, generation).await;
    }

    async fn send_text_message(self: &Arc<Self>, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring empty text message");
            return;
        }
        let generation = self.generation();
        if !self.transition(VoiceState::Idle, VoiceState::Processing) {
            debug!("send_text_message ignored in {:?}", self.current());
            return;
        }

        let request = VoiceTurnRequest::text(
            text,
            self.config.profile.clone(),
            self.request_context(),
        );
        self.run_turn(request, generation).await;
    }

    /// `Processing` → `Speaking` or `Idle`
    async fn run_turn(self: &Arc<Self>, request: VoiceTurnRequest, generation: u64) {
        let reply = self.transport.send(&request).await;
        if self.is_stale(generation) {
            debug!("Discarding reply of a cancelled turn");
            return;
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return self.fail(generation, e),
        };

        if let Some(text) = reply.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let text = text.to_string();
            self.snapshot.send_modify(|snap| snap.transcript = Some(text));
        }

        let audio = match reply.audio_base64.as_deref() {
            Some(audio) if !reply.fallback => audio,
            _ => {
                info!("Text-only reply");
                self.transition(VoiceState::Processing, VoiceState::Idle);
                return;
            }
        };

        let path = match self.write_reply(audio).await {
            Ok(path) => path,
            Err(e) => return self.fail(generation, VoiceError::ReplyAudio(e)),
        };

        if self.is_stale(generation) {
            remove_quietly(&path).await;
            return;
        }

        if let Err(e) = self.player.play(&path).await {
            remove_quietly(&path).await;
            return self.fail(generation, VoiceError::Playback(e));
        }

        if !self.transition(VoiceState::Processing, VoiceState::Speaking) {
            // Cancelled between the stale check and playback
            teardown("pause playback", self.player.pause()).await;
            remove_quietly(&path).await;
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.finish_speaking(path, generation).await;
        });
    }

    /// `Speaking` → `Idle`, then re-arm listening when enabled
    async fn finish_speaking(self: Arc<Self>, path: PathBuf, generation: u64) {
        self.player
            .wait_finished(self.config.playback_poll_interval)
            .await;
        remove_quietly(&path).await;

        if self.is_stale(generation) || !self.transition(VoiceState::Speaking, VoiceState::Idle) {
            return;
        }
        info!("Reply finished");

        if !self.config.auto_listen {
            return;
        }

        tokio::time::sleep(self.config.relisten_delay).await;
        if self.is_stale(generation) {
            return;
        }
        self.start_listening().await;
    }

    async fn write_reply(&self, audio_base64: &str) -> Result<PathBuf> {
        let bytes = pcm::from_base64(audio_base64).context("Reply audio is not valid base64")?;
        if bytes.is_empty() {
            anyhow::bail!("Reply audio is empty");
        }

        let path = self
            .config
            .scratch_dir
            .join(format!("reply-{}.wav", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write reply audio: {:?}", path))?;

        debug!("Reply audio written to {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    async fn discard_recording(&self) {
        if let Ok(Ok(Some(path))) = tokio::time::timeout(TEARDOWN_TIMEOUT, self.recorder.stop()).await {
            remove_quietly(&path).await;
        }
    }

    async fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Cancelling voice interaction in {:?}", self.current());

        if self.recorder.is_recording() {
            self.discard_recording().await;
        }
        teardown("pause playback", self.player.pause()).await;

        self.force_idle();
    }
}

/// Await a cleanup call, logging and swallowing failures
async fn teardown<F>(what: &str, call: F)
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(TEARDOWN_TIMEOUT, call).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to {}: {:#}", what, e),
        Err(_) => warn!("Timed out trying to {}", what),
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!("Could not remove {}: {}", path.display(), e);
    }
}

/// Read a finished recording as a mono 16-bit WAV, `None` if it holds no samples
async fn load_recording(path: PathBuf) -> Result<Option<Vec<u8>>> {
    let audio = tokio::task::spawn_blocking(move || AudioFile::open(&path))
        .await
        .context("Recording reader panicked")??;

    if audio.is_empty() {
        return Ok(None);
    }

    Ok(Some(wav::encode(
        &audio.to_mono_pcm(),
        WavSpec::mono_16bit(audio.sample_rate),
    )))
}
