//! # Data Transfer Objects
//!
//! Request and response bodies of the HTTP adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ClickRecord, LinkRecord, SOURCE_STATS_PAGE};

/// Maximum number of links accepted by one batch request
pub const MAX_BATCH_SIZE: usize = 5;

// =====================================
// Requests
// =====================================
/// Create one short link.
///
/// ```json
/// { "longUrl": "https://example.com", "ttlMinutes": 30, "customShortcode": "mylink" }
/// ```
///
/// Syntax of the fields is checked by the registry so that each problem maps
/// to its own error (`InvalidUrl`, `InvalidTtl`, `InvalidShortcode`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    #[validate(length(max = 2048, message = "URL is too long"))]
    pub long_url: String,

    #[serde(default)]
    pub ttl_minutes: Option<i64>,

    #[serde(default)]
    pub custom_shortcode: Option<String>,
}

/// Create several links at once; each entry succeeds or fails on its own.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchCreateRequest {
    #[validate(length(min = 1, max = 5, message = "A batch holds 1-5 links"))]
    pub links: Vec<CreateLinkRequest>,
}

/// Record a click from somewhere other than the redirect path.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordClickRequest {
    #[serde(default = "default_click_source")]
    #[validate(length(min = 1, max = 64, message = "Source must be 1-64 characters"))]
    pub source: String,
}

fn default_click_source() -> String {
    SOURCE_STATS_PAGE.to_string()
}

// =====================================
// Responses
// =====================================
/// Generic success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A link as shown to callers, with derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub id: String,
    pub long_url: String,
    pub shortcode: String,
    pub short_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_live: bool,
    pub click_count: usize,
    pub clicks: Vec<ClickRecord>,
}

impl LinkResponse {
    #[must_use]
    pub fn from_record(record: &LinkRecord, base_url: &str) -> Self {
        Self {
            id: record.id.to_string(),
            long_url: record.long_url.clone(),
            shortcode: record.shortcode.clone(),
            short_url: record.short_url(base_url),
            created_at: record.created_at,
            expires_at: record.expires_at,
            is_live: record.is_live(),
            click_count: record.click_count(),
            clicks: record.clicks.clone(),
        }
    }
}

/// Outcome of one entry in a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResponse {
    pub index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkResponse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Registry-wide counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_links: usize,
    pub live_links: usize,
    pub expired_links: usize,
    pub total_clicks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: bool,
}

impl HealthResponse {
    #[must_use]
    pub fn new(storage_ok: bool) -> Self {
        Self {
            status: if storage_ok { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: storage_ok,
        }
    }
}
