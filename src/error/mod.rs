//! # Error Handling
//!
//! Error taxonomy for the registry, the persistence layer and the HTTP adapter.
//!
//! ## Categories
//! - **Input errors**: reported synchronously to the caller, registry unchanged
//! - **Lookup outcomes**: `NotFound` / `LinkExpired`, never fatal
//! - **Persistence errors**: `LoadFailure` / `SaveFailure`, logged and absorbed
//!   by the registry so the running process keeps its in-memory state

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

// =====================================
// Result Type Alias
// =====================================
/// Result with [`AppError`] as the default error type.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

// =====================================
// Custom Error Enum
// =====================================
/// Main error type of the crate.
#[derive(Debug, Error)]
pub enum AppError {
    // ----------------------------------------
    // Caller input errors (4xx)
    // ----------------------------------------

    /// Long URL is not a well-formed absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// TTL is not a positive number of minutes
    #[error("Invalid TTL: {0} minutes")]
    InvalidTtl(i64),

    /// Custom shortcode does not match `^[A-Za-z0-9_-]{4,20}$`
    #[error("Invalid shortcode: '{0}'")]
    InvalidShortcode(String),

    /// Custom shortcode already held by a live record
    #[error("Shortcode '{0}' is already in use")]
    ShortcodeTaken(String),

    /// No free shortcode found within the retry budget
    #[error("Could not generate a unique shortcode after {0} attempts")]
    GenerationExhausted(u32),

    /// Request body failed DTO validation
    #[error("Validation error: {0}")]
    Validation(String),

    // ----------------------------------------
    // Lookup outcomes
    // ----------------------------------------

    #[error("Not found: {0}")]
    NotFound(String),

    /// Record exists but is past its `expires_at`
    #[error("Link '{0}' has expired")]
    LinkExpired(String),

    // ----------------------------------------
    // Persistence errors (absorbed by the registry)
    // ----------------------------------------

    #[error("Failed to load stored links: {0}")]
    LoadFailure(String),

    #[error("Failed to save links: {0}")]
    SaveFailure(String),

    // ----------------------------------------
    // Server errors (5xx)
    // ----------------------------------------

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// HTTP status code matching the error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUrl(_)
            | Self::InvalidTtl(_)
            | Self::InvalidShortcode(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ShortcodeTaken(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::LinkExpired(_) => StatusCode::GONE,
            Self::GenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,

            Self::LoadFailure(_)
            | Self::SaveFailure(_)
            | Self::Internal(_)
            | Self::Server(_)
            | Self::Config(_)
            | Self::Database(_)
            | Self::Migration(_)
            | Self::Io(_)
            | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code used in error responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::InvalidTtl(_) => "INVALID_TTL",
            Self::InvalidShortcode(_) => "INVALID_SHORTCODE",
            Self::ShortcodeTaken(_) => "SHORTCODE_TAKEN",
            Self::GenerationExhausted(_) => "GENERATION_EXHAUSTED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::LinkExpired(_) => "LINK_EXPIRED",
            Self::LoadFailure(_) => "LOAD_FAILURE",
            Self::SaveFailure(_) => "SAVE_FAILURE",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Whether the error was caused by caller input and leaves state unchanged.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::InvalidTtl(_)
                | Self::InvalidShortcode(_)
                | Self::ShortcodeTaken(_)
                | Self::GenerationExhausted(_)
                | Self::Validation(_)
        )
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    #[must_use]
    pub fn shortcode_not_found(shortcode: &str) -> Self {
        Self::NotFound(format!("Shortcode '{}' not found", shortcode))
    }
}

// =====================================
// Error Response DTO
// =====================================
/// Error body returned by the HTTP adapter.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code (e.g. "SHORTCODE_TAKEN")
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status_code: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = Some(status.as_u16());
        self
    }
}

// =====================================
// IntoResponse Implementation
// =====================================
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(error = %self, "Server error occurred");
        }

        let status = self.status_code();
        let body = ErrorResponse::new(self.code(), self.to_string()).with_status(status);

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

// =====================================
// Option Extensions
// =====================================
/// Extension trait for turning `None` into [`AppError::NotFound`].
pub trait OptionExt<T> {
    fn ok_or_not_found(self, message: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.into()))
    }
}
