use crate::roster::Roster;
use crate::service::RespawnService;
use crate::status::Status;
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub slots: usize,
    pub killed: usize,
}

/// Create read-only query router
pub fn create_query_router(service: Arc<RespawnService>) -> Router {
    Router::new()
        .route("/roster", get(get_roster))
        .route("/status", get(get_status))
        .route("/health", get(health))
        .with_state(service)
}

/// GET /roster - Ordered bosses and channels
async fn get_roster(State(service): State<Arc<RespawnService>>) -> Json<Roster> {
    Json(service.roster().clone())
}

/// GET /status - Derived status of every slot at server time
async fn get_status(
    State(service): State<Arc<RespawnService>>,
) -> Json<BTreeMap<String, Status>> {
    Json(service.statuses(Utc::now()).await)
}

/// GET /health
async fn health(State(service): State<Arc<RespawnService>>) -> Json<HealthResponse> {
    let snapshot = service.get_state().await;
    Json(HealthResponse {
        status: "ok",
        slots: snapshot.len(),
        killed: snapshot.killed_count(),
    })
}
