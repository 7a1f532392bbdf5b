use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::audio::WavSpec;
use crate::broker::BrokerSettings;
use crate::http::DEFAULT_MAX_BODY_BYTES;
use crate::i18n::Locale;
use crate::live::GeminiSettings;

/// Environment prefix for overrides, e.g. TUTOR_VOICE__LIVE__MODEL
const ENV_PREFIX: &str = "TUTOR_VOICE";

/// Fallback source for the API key
const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveConfig,
    pub tutor: TutorConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct LiveConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub voice: Option<String>,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub turn_timeout_secs: u64,
    pub close_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct TutorConfig {
    pub locale: Locale,
}

impl Config {
    /// Load defaults, then the optional file at `path`, then environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "tutor-voice")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8080)?
            .set_default("service.http.max_body_bytes", DEFAULT_MAX_BODY_BYTES as i64)?
            .set_default(
                "live.endpoint",
                "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent",
            )?
            .set_default("live.model", "gemini-2.0-flash-live-001")?
            .set_default("live.input_sample_rate", 16000)?
            .set_default("live.output_sample_rate", 24000)?
            .set_default("live.turn_timeout_secs", 30)?
            .set_default("live.close_timeout_secs", 2)?
            .set_default("tutor.locale", "es")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if cfg.live.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                cfg.live.api_key = key;
            }
        }

        Ok(cfg)
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            endpoint: self.live.endpoint.clone(),
            api_key: self.live.api_key.clone(),
            model: self.live.model.clone(),
            voice: self.live.voice.clone(),
        }
    }

    pub fn broker_settings(&self) -> BrokerSettings {
        BrokerSettings {
            turn_timeout: Duration::from_secs(self.live.turn_timeout_secs),
            close_timeout: Duration::from_secs(self.live.close_timeout_secs),
            input_sample_rate: self.live.input_sample_rate,
            output_spec: WavSpec::mono_16bit(self.live.output_sample_rate),
            locale: self.tutor.locale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load("/nonexistent/tutor-voice").unwrap();

        assert_eq!(cfg.service.http.port, 8080);
        assert_eq!(cfg.service.http.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(cfg.tutor.locale, Locale::Es);

        let broker = cfg.broker_settings();
        assert_eq!(broker.turn_timeout, Duration::from_secs(30));
        assert_eq!(broker.close_timeout, Duration::from_secs(2));
        assert_eq!(broker.output_spec, WavSpec::mono_16bit(24000));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("voice.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[live]\nmodel = \"models/custom\"\nvoice = \"Puck\"\nturn_timeout_secs = 12\n\n[tutor]\nlocale = \"en\""
        )
        .unwrap();

        let cfg = Config::load(path.to_str().unwrap()).unwrap();

        assert_eq!(cfg.tutor.locale, Locale::En);
        assert_eq!(cfg.broker_settings().turn_timeout, Duration::from_secs(12));
        let gemini = cfg.gemini_settings();
        assert_eq!(gemini.model, "models/custom");
        assert_eq!(gemini.voice.as_deref(), Some("Puck"));
    }
}
