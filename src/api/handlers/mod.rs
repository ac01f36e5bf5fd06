//! # HTTP Handlers
//!
//! Each handler extracts its inputs, calls the registry and maps the result
//! to a response. Errors convert through `AppError: IntoResponse`.

pub mod health;
pub mod links;
pub mod stats;
