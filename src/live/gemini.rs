use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::{
    Blob, ClientContent, ClientContentMessage, Content, EmptyConfig, GenerationConfig,
    PrebuiltVoiceConfig, RealtimeInput, RealtimeInputMessage, ServerMessage, Setup, SetupMessage,
    SpeechConfig, VoiceConfig,
};
use super::{LiveConnector, LiveEvent, LiveSession, SessionSetup};
use crate::audio::pcm;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for the Gemini Live API
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// WebSocket endpoint of the BidiGenerateContent service
    pub endpoint: String,
    pub api_key: String,
    /// Model name, with or without the "models/" prefix
    pub model: String,
    /// Prebuilt voice name; upstream default when unset
    pub voice: Option<String>,
}

/// Opens one Gemini Live WebSocket per turn
pub struct GeminiLiveConnector {
    settings: GeminiSettings,
}

impl GeminiLiveConnector {
    pub fn new(settings: GeminiSettings) -> Self {
        Self { settings }
    }

    fn qualified_model(&self) -> String {
        if self.settings.model.starts_with("models/") {
            self.settings.model.clone()
        } else {
            format!("models/{}", self.settings.model)
        }
    }

    fn setup_message(&self, setup: &SessionSetup) -> SetupMessage {
        SetupMessage {
            setup: Setup {
                model: self.qualified_model(),
                generation_config: GenerationConfig {
                    response_modalities: setup
                        .response_modalities
                        .iter()
                        .map(|m| m.as_str().to_string())
                        .collect(),
                    speech_config: self.settings.voice.as_ref().map(|voice| SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: voice.clone(),
                            },
                        },
                    }),
                },
                system_instruction: Content::text(None, &setup.system_instruction),
                output_audio_transcription: Some(EmptyConfig {}),
            },
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn open(&self, setup: &SessionSetup) -> Result<Box<dyn LiveSession>> {
        if self.settings.api_key.is_empty() {
            bail!("Live API key is not configured");
        }

        let url = format!("{}?key={}", self.settings.endpoint, self.settings.api_key);
        debug!("Connecting to {}", self.settings.endpoint);

        let (ws, _response) = connect_async(url)
            .await
            .context("Failed to connect to Live API")?;

        let mut session = GeminiLiveSession {
            ws,
            pending: VecDeque::new(),
            closed: false,
        };

        session.send_json(&self.setup_message(setup)).await?;
        session.await_setup_complete().await?;

        info!("Live session open ({})", self.qualified_model());

        Ok(Box::new(session))
    }
}

/// A single Gemini Live WebSocket session
pub struct GeminiLiveSession {
    ws: WsStream,
    /// Events parsed from a message but not yet handed out
    pending: VecDeque<LiveEvent>,
    closed: bool,
}

impl GeminiLiveSession {
    async fn send_json<T: Serialize>(&mut self, message: &T) -> Result<()> {
        if self.closed {
            bail!("Live session already closed");
        }
        let payload = serde_json::to_string(message)?;
        self.ws
            .send(Message::text(payload))
            .await
            .context("Failed to send to Live API")?;
        Ok(())
    }

    async fn await_setup_complete(&mut self) -> Result<()> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    if self.check_setup(text.as_str().as_bytes())? {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    if self.check_setup(&bytes)? {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    bail!("Live API closed during setup: {:?}", frame);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed = true;
                    return Err(e).context("Live API error during setup");
                }
                None => {
                    self.closed = true;
                    bail!("Live API closed during setup");
                }
            }
        }
    }

    fn check_setup(&self, payload: &[u8]) -> Result<bool> {
        let message: ServerMessage =
            serde_json::from_slice(payload).context("Unparseable setup response")?;
        if message.is_setup_complete() {
            return Ok(true);
        }
        if let Some(LiveEvent::Error(err)) = message
            .into_events()
            .into_iter()
            .find(|e| matches!(e, LiveEvent::Error(_)))
        {
            bail!("Live API rejected setup: {}", err);
        }
        Ok(false)
    }

    fn ingest(&mut self, payload: &[u8]) {
        match serde_json::from_slice::<ServerMessage>(payload) {
            Ok(message) => {
                if message.go_away.is_some() {
                    warn!("Live API announced disconnect (goAway)");
                }
                self.pending.extend(message.into_events());
            }
            Err(e) => warn!("Ignoring unparseable Live API message: {}", e),
        }
    }
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send_realtime_audio(&mut self, pcm_bytes: &[u8], sample_rate: u32) -> Result<()> {
        debug!("Sending {} bytes of audio at {}Hz", pcm_bytes.len(), sample_rate);
        self.send_json(&RealtimeInputMessage {
            realtime_input: RealtimeInput {
                audio: Some(Blob {
                    mime_type: format!("audio/pcm;rate={}", sample_rate),
                    data: pcm::to_base64(pcm_bytes),
                }),
                audio_stream_end: None,
            },
        })
        .await
    }

    async fn send_turn_complete(&mut self) -> Result<()> {
        self.send_json(&RealtimeInputMessage {
            realtime_input: RealtimeInput {
                audio: None,
                audio_stream_end: Some(true),
            },
        })
        .await
    }

    async fn send_text_turn(&mut self, text: &str) -> Result<()> {
        self.send_json(&ClientContentMessage {
            client_content: ClientContent {
                turns: vec![Content::text(Some("user"), text)],
                turn_complete: true,
            },
        })
        .await
    }

    async fn next_event(&mut self) -> LiveEvent {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return event;
            }
            if self.closed {
                return LiveEvent::Closed;
            }

            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => self.ingest(text.as_str().as_bytes()),
                Some(Ok(Message::Binary(bytes))) => self.ingest(&bytes),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Live API closed the session: {:?}", frame);
                    self.closed = true;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.closed = true;
                    return LiveEvent::Error(e.to_string());
                }
                None => self.closed = true,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.ws
            .close(None)
            .await
            .context("Failed to close Live API session")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::Modality;

    fn connector(model: &str, voice: Option<&str>) -> GeminiLiveConnector {
        GeminiLiveConnector::new(GeminiSettings {
            endpoint: "wss://example.invalid/live".to_string(),
            api_key: "key".to_string(),
            model: model.to_string(),
            voice: voice.map(str::to_string),
        })
    }

    #[test]
    fn test_model_is_qualified_once() {
        assert_eq!(connector("gemini-live", None).qualified_model(), "models/gemini-live");
        assert_eq!(connector("models/gemini-live", None).qualified_model(), "models/gemini-live");
    }

    #[test]
    fn test_setup_carries_instruction_and_voice() {
        let setup = SessionSetup {
            system_instruction: "Speak slowly".to_string(),
            response_modalities: vec![Modality::Audio],
        };
        let json = serde_json::to_value(connector("m", Some("Aoede")).setup_message(&setup)).unwrap();

        assert_eq!(json["setup"]["model"], "models/m");
        assert_eq!(json["setup"]["systemInstruction"]["parts"][0]["text"], "Speak slowly");
        assert_eq!(
            json["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Aoede"
        );
    }

    #[tokio::test]
    async fn test_open_without_key_fails() {
        let connector = GeminiLiveConnector::new(GeminiSettings {
            endpoint: "wss://example.invalid/live".to_string(),
            api_key: String::new(),
            model: "m".to_string(),
            voice: None,
        });
        let setup = SessionSetup {
            system_instruction: String::new(),
            response_modalities: vec![Modality::Audio],
        };
        assert!(connector.open(&setup).await.is_err());
    }
}
