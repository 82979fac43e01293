// HTTP API over the respawn service

pub mod query;
pub mod slots;

pub use query::create_query_router;
pub use slots::{create_slots_router, ApiError};

use crate::service::RespawnService;
use axum::Router;
use std::sync::Arc;

/// Full tracker router: state reads/writes plus roster, status and health
pub fn create_router(service: Arc<RespawnService>) -> Router {
    create_slots_router(Arc::clone(&service)).merge(create_query_router(service))
}
