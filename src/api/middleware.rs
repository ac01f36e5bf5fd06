//! # Middleware
//!
//! `from_fn` middleware wrapped around every route.

use std::time::Instant;

use axum::{
    body::Body,
    http::{header::HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =====================================
// Request Timing
// =====================================
/// Logs method, path, status and duration of each request.
pub async fn request_timing(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

// =====================================
// Request ID
// =====================================
/// Propagates `X-Request-Id`, generating one when the client sent none.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| HeaderValue::from_str(v).ok());

    let request_id = match incoming {
        Some(value) => value,
        None => match HeaderValue::from_str(&generate_request_id()) {
            Ok(value) => value,
            Err(_) => return next.run(request).await,
        },
    };

    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);

    response
}

/// Fresh 12-character request id.
#[must_use]
pub fn generate_request_id() -> String {
    nanoid::nanoid!(12)
}
