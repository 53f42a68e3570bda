use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Json};
use crate::models::{HealthResponse, ReadyResponse};
use crate::state::AppState;
use tracing::{debug, warn};

/// Health check endpoint
pub async fn health_check(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        service: app_state.config.service_name.clone(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint, fails while the room store is unreachable
pub async fn ready_check(State(app_state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    debug!("Readiness check requested");
    let store = app_state.store.backend_name().to_string();
    match app_state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ok".to_string(),
                store,
                message: "Service is ready".to_string(),
            }),
        ),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "unavailable".to_string(),
                    store,
                    message: e.to_string(),
                }),
            )
        }
    }
}
