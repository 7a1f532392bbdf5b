use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::VoiceError;
use crate::protocol::{TurnResponse, VoiceTurnRequest};

/// Delivers a turn to the broker and returns its reply
#[async_trait]
pub trait TurnTransport: Send + Sync {
    async fn send(&self, request: &VoiceTurnRequest) -> Result<TurnResponse, VoiceError>;
}

/// Posts turns to a broker over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Broker requests are capped at 30s upstream; leave room for upload and framing
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, request: &VoiceTurnRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

#[async_trait]
impl TurnTransport for HttpTransport {
    async fn send(&self, request: &VoiceTurnRequest) -> Result<TurnResponse, VoiceError> {
        let url = self.url_for(request);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request.to_body())
            .send()
            .await
            .map_err(|e| VoiceError::Network(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            // Failure bodies still carry `error`; fall back to the status line
            let body = response.json::<TurnResponse>().await.ok();
            let message = body
                .and_then(|b| b.error)
                .unwrap_or_else(|| status.to_string());
            warn!("Broker answered {}: {}", status, message);
            return Err(VoiceError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<TurnResponse>()
            .await
            .map_err(|e| VoiceError::Network(e.into()))
    }
}
