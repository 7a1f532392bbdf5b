use crate::broker::TurnBroker;
use crate::i18n::Locale;
use std::sync::Arc;

/// Shared application state for HTTP handlers
///
/// Read-only: the broker keeps no registry of sessions, each request owns
/// its own upstream session.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<TurnBroker>,
    pub locale: Locale,
}

impl AppState {
    pub fn new(broker: TurnBroker) -> Self {
        let locale = broker.settings().locale;
        Self {
            broker: Arc::new(broker),
            locale,
        }
    }
}
