use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API response for the readiness check
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReadyResponse {
    pub status: String,
    pub store: String,
    pub message: String,
}
