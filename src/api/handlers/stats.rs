//! # Stats Handlers

use axum::{extract::State, Json};

use crate::{
    models::{ApiResponse, PurgeResponse, RegistryStats},
    services::AppState,
};

/// Link and click counts.
///
/// # Endpoint
/// `GET /api/stats`
pub async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<RegistryStats>> {
    Json(ApiResponse::success(state.registry.stats().await))
}

/// Drops expired links.
///
/// # Endpoint
/// `POST /api/purge`
pub async fn purge_expired(State(state): State<AppState>) -> Json<ApiResponse<PurgeResponse>> {
    let removed = state.registry.purge_expired().await;

    Json(ApiResponse::success(PurgeResponse { removed }))
}
