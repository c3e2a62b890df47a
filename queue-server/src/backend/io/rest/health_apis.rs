use axum::{extract::State, response::Json, routing::get, Router};
use log::debug;
use shared::HealthResponse;

use crate::backend::storage::Connection;
use crate::backend::AppState;

pub fn router<C: Connection>() -> Router<AppState<C>> {
    Router::new().route("/health", get(health::<C>))
}

/// Liveness check; also reports which storage backend is active
pub async fn health<C: Connection>(State(state): State<AppState<C>>) -> Json<HealthResponse> {
    debug!("GET /api/health");
    Json(HealthResponse {
        success: true,
        message: "Queue service is running".to_string(),
        storage_backend: state.storage_backend.to_string(),
        timestamp: state.clock.now().to_rfc3339(),
    })
}
