use crate::service::{ResetError, RespawnService, UpdateError};
use crate::store::Snapshot;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Body of `POST /update_boss_status`
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub key: Option<String>,
    /// ISO-8601 kill time; null marks the boss active
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub message: String,
    pub current_state: Snapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub reseted_bosses_count: usize,
}

/// Create slot state router
pub fn create_slots_router(service: Arc<RespawnService>) -> Router {
    Router::new()
        .route("/get_state", get(get_state))
        .route("/update_boss_status", post(update_boss_status))
        .route("/reset_channel/:channel", post(reset_channel))
        .with_state(service)
}

/// GET /get_state - Full snapshot
async fn get_state(State(service): State<Arc<RespawnService>>) -> Json<Snapshot> {
    debug!("GET /get_state");
    Json(service.get_state().await)
}

/// POST /update_boss_status - Mark one slot killed or active
async fn update_boss_status(
    State(service): State<Arc<RespawnService>>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!(error = %e.body_text(), "Malformed update request");
        ApiError::MalformedRequest(format!("Malformed request body: {}", e.body_text()))
    })?;

    let key = match request.key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => {
            warn!("Update request without boss key");
            return Err(ApiError::MalformedRequest("Missing boss key".to_string()));
        }
    };

    let current_state = service
        .update_slot(key, request.timestamp.as_deref())
        .await?;

    Ok(Json(UpdateResponse {
        message: "Status updated successfully".to_string(),
        current_state,
    }))
}

/// POST /reset_channel/:channel - Set every slot of a channel active
async fn reset_channel(
    State(service): State<Arc<RespawnService>>,
    Path(channel): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let (count, _) = service.reset_channel(&channel).await?;

    Ok(Json(ResetResponse {
        message: format!("Channel {} reset successfully", channel),
        reseted_bosses_count: count,
    }))
}

/// Slot API errors
#[derive(Debug)]
pub enum ApiError {
    MalformedRequest(String),
    UnknownKey(String),
    InvalidTimestamp(String),
    UnknownChannel(String),
    PersistenceFailure(String),
}

impl From<UpdateError> for ApiError {
    fn from(e: UpdateError) -> Self {
        match e {
            UpdateError::UnknownKey(inner) => ApiError::UnknownKey(format!(
                "Unknown or invalid boss key {}: {}",
                inner.key(),
                inner
            )),
            UpdateError::InvalidTimestamp(inner) => {
                ApiError::InvalidTimestamp(format!("Invalid timestamp format: {}", inner))
            }
            UpdateError::Persistence(msg) => ApiError::PersistenceFailure(msg),
        }
    }
}

impl From<ResetError> for ApiError {
    fn from(e: ResetError) -> Self {
        match e {
            ResetError::UnknownChannel(channel) => {
                ApiError::UnknownChannel(format!("Unknown channel {}", channel))
            }
            ResetError::Persistence(msg) => ApiError::PersistenceFailure(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MalformedRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnknownKey(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidTimestamp(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnknownChannel(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PersistenceFailure(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to persist state: {}", msg),
            ),
        };

        let body = Json(serde_json::json!({
            "message": message,
        }));

        (status, body).into_response()
    }
}
