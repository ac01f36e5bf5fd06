//! # HTTP Adapter
//!
//! Thin axum layer over [`LinkRegistry`](crate::services::LinkRegistry).
//! Handlers translate requests into registry calls and nothing more.
//!
//! ## Routes
//! - `GET /:code` - redirect to the long URL and record a "direct" click
//! - `POST /api/links` - create a link
//! - `POST /api/links/batch` - create up to five links
//! - `GET /api/links` - list every link, live and expired
//! - `DELETE /api/links/:id` - delete a link by id
//! - `GET /api/shortcodes/:code` - look a link up by shortcode
//! - `POST /api/shortcodes/:code/clicks` - record a click with a source
//! - `GET /api/stats` - registry counts
//! - `POST /api/purge` - drop expired links
//! - `GET /api/health` - health check
//!
//! Everything except the redirect lives under `/api`, so every valid
//! shortcode (including words like `health`) reaches the redirect route.
//! Shortcodes are at least four characters, so `api` itself never clashes.

mod handlers;
mod middleware;

pub use handlers::*;
pub use middleware::*;

use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::services::AppState;

// =====================================
// Router Builder
// =====================================
/// Builds the application router around `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:code", get(handlers::links::redirect_handler))
        .nest("/api", api_routes())
        .layer(axum_middleware::from_fn(middleware::request_timing))
        .layer(axum_middleware::from_fn(middleware::request_id))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/links", link_routes())
        .nest("/shortcodes", shortcode_routes())
        .route("/stats", get(handlers::stats::get_stats))
        .route("/purge", post(handlers::stats::purge_expired))
        .route("/health", get(handlers::health::health_check))
}

fn link_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::links::create_link).get(handlers::links::list_links),
        )
        .route("/batch", post(handlers::links::create_links))
        .route("/:id", delete(handlers::links::delete_link))
}

fn shortcode_routes() -> Router<AppState> {
    Router::new()
        .route("/:code", get(handlers::links::get_link))
        .route("/:code/clicks", post(handlers::links::record_click))
}
