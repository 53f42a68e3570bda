use crate::{docs::ApiDoc, handlers::{diagnostics, health_check, not_found, ready_check}, state::AppState, websocket::websocket_handler};
use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create API routes
pub fn create_api_routes() -> Router<Arc<AppState>> {
    Router::<Arc<AppState>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
}

/// The whole application: WebSocket endpoint, API, Swagger UI
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config.cors_origin_list(), app_state.config.is_development());

    Router::new()
        .route("/ws", get(websocket_handler))
        .nest("/api", create_api_routes())
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configured origins win; development without any allows every origin.
/// A layer with no allowed origin adds no CORS headers.
fn cors_layer(origins: &[String], development: bool) -> CorsLayer {
    if origins.is_empty() && !development {
        return CorsLayer::new();
    }
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(allowed).allow_methods(Any).allow_headers(Any)
}
