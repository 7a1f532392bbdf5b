use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::accumulator::{Completion, TurnAccumulator, TurnOutcome};
use super::error::TurnError;
use crate::audio::{wav, WavSpec};
use crate::i18n::Locale;
use crate::live::{LiveConnector, LiveEvent, LiveSession, Modality, SessionSetup};
use crate::prompt;
use crate::protocol::{TurnPayload, VoiceTurnRequest};

/// Broker tuning, read-only for the life of the process
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Ceiling over open, send and collect
    pub turn_timeout: Duration,
    /// Bound on closing the upstream session once the turn is over
    pub close_timeout: Duration,
    /// Rate assumed for raw PCM uploads
    pub input_sample_rate: u32,
    /// Layout of the audio the model returns
    pub output_spec: WavSpec,
    pub locale: Locale,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(2),
            input_sample_rate: 16000,
            output_spec: WavSpec::default(),
            locale: Locale::default(),
        }
    }
}

/// Input ready to go upstream
#[derive(Debug)]
enum LiveInput {
    Audio { pcm: Vec<u8>, sample_rate: u32 },
    Text(String),
}

/// Bridges one request to one upstream session
///
/// Holds no per-turn state: each `run` opens its own session and closes it
/// before returning, so concurrent turns never share anything mutable.
pub struct TurnBroker {
    connector: Arc<dyn LiveConnector>,
    settings: BrokerSettings,
}

impl TurnBroker {
    pub fn new(connector: Arc<dyn LiveConnector>, settings: BrokerSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Run one turn to completion, close, or timeout
    pub async fn run(&self, request: &VoiceTurnRequest) -> Result<TurnOutcome, TurnError> {
        let input = self.prepare_input(&request.payload)?;

        let setup = SessionSetup {
            system_instruction: prompt::system_instruction(
                self.settings.locale,
                &request.profile,
                request.context.as_deref(),
            ),
            response_modalities: vec![Modality::Audio],
        };

        let deadline = Instant::now() + self.settings.turn_timeout;

        let mut session = match timeout_at(deadline, self.connector.open(&setup)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(TurnError::Connect(e)),
            Err(_) => return Err(TurnError::Timeout(self.settings.turn_timeout)),
        };

        let result = match timeout_at(deadline, drive(session.as_mut(), input)).await {
            Ok(result) => result,
            Err(_) => Err(TurnError::Timeout(self.settings.turn_timeout)),
        };

        match timeout(self.settings.close_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to close upstream session: {:#}", e),
            Err(_) => warn!(
                "Upstream session did not close within {:?}, dropping it",
                self.settings.close_timeout
            ),
        }

        match &result {
            Ok(outcome) => info!(
                "Turn finished ({:?}): {} audio chunks, {} bytes PCM, transcript: {}",
                outcome.completion,
                outcome.chunk_count,
                outcome.pcm.len(),
                outcome.transcript.is_some()
            ),
            Err(e) => warn!("Turn failed ({}): {}", e.reason(), e),
        }

        result
    }

    fn prepare_input(&self, payload: &TurnPayload) -> Result<LiveInput, TurnError> {
        match payload {
            TurnPayload::Text(text) => Ok(LiveInput::Text(text.clone())),
            TurnPayload::Audio(bytes) if wav::is_wav(bytes) => {
                let (spec, data) =
                    wav::decode(bytes).map_err(|e| TurnError::InvalidInput(e.to_string()))?;
                if spec.bits_per_sample != 16 || spec.channels != 1 {
                    return Err(TurnError::InvalidInput(format!(
                        "expected 16-bit mono, got {}-bit {}ch",
                        spec.bits_per_sample, spec.channels
                    )));
                }
                if data.is_empty() {
                    return Err(TurnError::InvalidInput("WAV has no samples".to_string()));
                }
                debug!("Unwrapped WAV upload: {} bytes at {}Hz", data.len(), spec.sample_rate);
                Ok(LiveInput::Audio {
                    pcm: data,
                    sample_rate: spec.sample_rate,
                })
            }
            TurnPayload::Audio(bytes) => Ok(LiveInput::Audio {
                pcm: bytes.clone(),
                sample_rate: self.settings.input_sample_rate,
            }),
        }
    }
}

/// Send the input, then fold events until the turn ends
async fn drive(session: &mut dyn LiveSession, input: LiveInput) -> Result<TurnOutcome, TurnError> {
    match input {
        LiveInput::Audio { pcm, sample_rate } => {
            session
                .send_realtime_audio(&pcm, sample_rate)
                .await
                .map_err(TurnError::Send)?;
            session.send_turn_complete().await.map_err(TurnError::Send)?;
        }
        LiveInput::Text(text) => {
            session.send_text_turn(&text).await.map_err(TurnError::Send)?;
        }
    }

    let mut acc = TurnAccumulator::new();

    loop {
        match session.next_event().await {
            LiveEvent::AudioChunk(data) => acc.push_audio_chunk(&data),
            LiveEvent::TextChunk(text) => acc.push_text(&text),
            LiveEvent::TurnComplete => return Ok(acc.finish(Completion::TurnComplete)),
            LiveEvent::Closed => {
                if acc.has_audio() {
                    warn!(
                        "Upstream closed before turn complete; keeping {} partial chunks",
                        acc.chunk_count()
                    );
                }
                return Ok(acc.finish(Completion::Closed));
            }
            LiveEvent::Error(message) => return Err(TurnError::Upstream(message)),
        }
    }
}
