use std::time::Duration;
use thiserror::Error;

/// Why a turn produced no result
#[derive(Error, Debug)]
pub enum TurnError {
    /// The captured audio could not be used
    #[error("invalid audio input: {0}")]
    InvalidInput(String),

    /// Opening the upstream session failed
    #[error("failed to open upstream session: {0:#}")]
    Connect(anyhow::Error),

    /// Sending the input upstream failed
    #[error("failed to send input upstream: {0:#}")]
    Send(anyhow::Error),

    /// Upstream reported an error mid-turn
    #[error("upstream session error: {0}")]
    Upstream(String),

    /// The turn ceiling elapsed before the model finished
    #[error("turn timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
}

impl TurnError {
    /// Stable machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            TurnError::InvalidInput(_) => "invalid_input",
            TurnError::Connect(_) => "upstream_connect",
            TurnError::Send(_) => "upstream_send",
            TurnError::Upstream(_) => "upstream_error",
            TurnError::Timeout(_) => "timeout",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TurnError::Timeout(_))
    }
}
