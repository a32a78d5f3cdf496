use axum::response::Json;

use crate::types::HealthResponse;

pub async fn root() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("Playlist Migrator API is running"))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("Service is healthy"))
}
