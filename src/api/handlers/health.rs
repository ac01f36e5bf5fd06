//! # Health Check Handler

use axum::{extract::State, Json};

use crate::{models::HealthResponse, services::AppState};

/// Reports whether the backing store answers.
///
/// # Endpoint
/// `GET /api/health`
///
/// # Response
/// ```json
/// { "status": "healthy", "version": "0.1.0", "storage": true }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage_ok = state.store.ping().await.is_ok();

    Json(HealthResponse::new(storage_ok))
}
