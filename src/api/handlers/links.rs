//! # Link Handlers
//!
//! Creation, lookup, deletion, click recording and the redirect itself.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;
use validator::Validate;

use crate::{
    error::{AppError, OptionExt, Result},
    models::{
        ApiResponse, BatchCreateRequest, BatchItemResponse, ClickRecord, CreateLinkRequest,
        LinkResponse, RecordClickRequest, SOURCE_DIRECT,
    },
    services::{AppState, ClickOutcome},
};

// =====================================
// Redirect
// =====================================
/// Redirects a live shortcode to its long URL.
///
/// # Endpoint
/// `GET /:code`
///
/// # Response
/// - 307 Temporary Redirect, after recording a "direct" click
/// - 404 if the shortcode is unknown, 410 if it has expired
/// - 500 if the stored long URL cannot be sent as a `Location` header
///   (no click is recorded in that case)
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    let link = state.registry.lookup_live(&code).await?;
    let location = redirect_location(&link.long_url)?;

    state.registry.record_click(&code, SOURCE_DIRECT).await;
    info!(shortcode = %code, "Redirecting from short URL");

    Ok((StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response())
}

/// `Location` header value for `long_url`.
///
/// The URL is re-serialized by the parser, which percent-encodes non-ASCII
/// characters. Snapshots are not re-validated on load, so a stored URL may
/// still be unusable; that is an error, never a panic.
fn redirect_location(long_url: &str) -> Result<HeaderValue> {
    let parsed = url::Url::parse(long_url)
        .map_err(|e| AppError::Internal(format!("Stored URL is malformed: {}", e)))?;

    HeaderValue::from_str(parsed.as_str())
        .map_err(|e| AppError::Internal(format!("Stored URL is not a valid header: {}", e)))
}

// =====================================
// Create
// =====================================
/// Creates one short link.
///
/// # Endpoint
/// `POST /api/links`
///
/// # Request Body
/// ```json
/// { "longUrl": "https://example.com/page", "ttlMinutes": 30, "customShortcode": "page" }
/// ```
pub async fn create_link(
    State(state): State<AppState>,
    Json(request): Json<CreateLinkRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;

    let link = state
        .registry
        .create_link(
            &request.long_url,
            request.ttl_minutes,
            request.custom_shortcode.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(LinkResponse::from_record(
            &link,
            &state.config.base_url,
        ))),
    ))
}

/// Creates up to five links; each entry reports its own outcome.
///
/// # Endpoint
/// `POST /api/links/batch`
///
/// # Response
/// 200 with one item per request entry, in request order.
pub async fn create_links(
    State(state): State<AppState>,
    Json(request): Json<BatchCreateRequest>,
) -> Result<Json<ApiResponse<Vec<BatchItemResponse>>>> {
    request.validate()?;

    let items = state
        .registry
        .create_links(&request.links)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(link) => BatchItemResponse {
                index,
                link: Some(LinkResponse::from_record(&link, &state.config.base_url)),
                error: None,
            },
            Err(e) => BatchItemResponse {
                index,
                link: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(ApiResponse::success(items)))
}

// =====================================
// Read
// =====================================
/// Lists every link, live and expired, in creation order.
///
/// # Endpoint
/// `GET /api/links`
pub async fn list_links(State(state): State<AppState>) -> Json<ApiResponse<Vec<LinkResponse>>> {
    let links = state
        .registry
        .list_all()
        .await
        .iter()
        .map(|link| LinkResponse::from_record(link, &state.config.base_url))
        .collect();

    Json(ApiResponse::success(links))
}

/// Looks a link up by shortcode, including expired links (`isLive` tells them apart).
///
/// # Endpoint
/// `GET /api/shortcodes/:code`
pub async fn get_link(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<LinkResponse>>> {
    let link = state
        .registry
        .lookup(&code)
        .await
        .ok_or_not_found(format!("Shortcode '{}' not found", code))?;

    Ok(Json(ApiResponse::success(LinkResponse::from_record(
        &link,
        &state.config.base_url,
    ))))
}

// =====================================
// Clicks
// =====================================
/// Records a click with an explicit source (defaults to "stats-page").
///
/// # Endpoint
/// `POST /api/shortcodes/:code/clicks`
pub async fn record_click(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<RecordClickRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;

    match state.registry.record_click(&code, &request.source).await {
        ClickOutcome::Recorded(click) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::<ClickRecord>::success(click)),
        )),
        ClickOutcome::NotFound => Err(AppError::shortcode_not_found(&code)),
    }
}

// =====================================
// Delete
// =====================================
/// Deletes a link by id. Deleting an unknown id also answers 204.
///
/// # Endpoint
/// `DELETE /api/links/:id`
pub async fn delete_link(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.registry.delete_link(&id).await;
    StatusCode::NO_CONTENT
}
