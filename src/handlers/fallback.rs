use axum::{http::{StatusCode, Uri}, Json};
use crate::models::ErrorResponse;
use tracing::debug;

/// Any route that does not exist
pub async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    debug!("No route for {}", uri);
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(StatusCode::NOT_FOUND, format!("No route for {}", uri.path()))),
    )
}
