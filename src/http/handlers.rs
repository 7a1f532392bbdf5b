use super::state::AppState;
use crate::broker::TurnError;
use crate::i18n::MessageKey;
use crate::protocol::{BodyError, TurnResponse, VoiceTurnBody, VoiceTurnRequest};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{info, info_span, warn, Instrument};

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/live/voice-turn
/// Answer a captured utterance with spoken audio
pub async fn voice_turn(
    State(state): State<AppState>,
    body: Result<Json<VoiceTurnBody>, JsonRejection>,
) -> Response {
    handle_turn(state, body, "voice-turn", VoiceTurnBody::into_audio_request).await
}

/// POST /api/live/voice-text
/// Answer a typed message with spoken audio
pub async fn voice_text(
    State(state): State<AppState>,
    body: Result<Json<VoiceTurnBody>, JsonRejection>,
) -> Response {
    handle_turn(state, body, "voice-text", VoiceTurnBody::into_text_request).await
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Turn lifecycle
// ============================================================================

/// Every path out of here is a JSON body; failures always carry `fallback`
async fn handle_turn(
    state: AppState,
    body: Result<Json<VoiceTurnBody>, JsonRejection>,
    endpoint: &'static str,
    into_request: fn(VoiceTurnBody) -> Result<VoiceTurnRequest, BodyError>,
) -> Response {
    let apology = state.locale.message(MessageKey::Apology);

    let request = match body {
        Ok(Json(body)) => into_request(body),
        Err(rejection) => {
            warn!("Rejected {} body: {}", endpoint, rejection);
            return failure(rejection.status(), rejection.body_text(), apology);
        }
    };

    let request = match request {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid {} request: {}", endpoint, e);
            return failure(StatusCode::BAD_REQUEST, e.to_string(), apology);
        }
    };

    let turn_id = uuid::Uuid::new_v4();
    let span = info_span!("turn", %turn_id, endpoint);

    async move {
        info!("Starting turn");

        match state.broker.run(&request).await {
            Ok(outcome) => {
                let response = outcome
                    .into_result(state.broker.settings().output_spec)
                    .into_response(apology);
                if response.fallback {
                    info!("No audio produced, answering with text fallback");
                }
                (StatusCode::OK, Json(response)).into_response()
            }
            Err(e) => failure(status_for(&e), e.to_string(), apology),
        }
    }
    .instrument(span)
    .await
}

fn status_for(error: &TurnError) -> StatusCode {
    match error {
        TurnError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TurnError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        TurnError::Connect(_) | TurnError::Send(_) | TurnError::Upstream(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn failure(status: StatusCode, error: String, apology: &str) -> Response {
    (status, Json(TurnResponse::failure(error, apology))).into_response()
}
