//! # Link Ledger
//!
//! Shortcode registry and click ledger for a URL shortener: allocates unique
//! shortcodes, expires links after a time-to-live, records clicks, and keeps
//! its state in a durable key-value store across restarts.
//!
//! ## Layout
//!
//! ```text
//! src/
//! ├── lib.rs
//! ├── main.rs         # HTTP server binary
//! ├── config/         # settings from the environment
//! ├── error/          # AppError and Result
//! ├── database/       # KeyValueStore: SQLite and memory backends
//! ├── models/         # LinkRecord, ClickRecord, DTOs
//! ├── services/       # LinkRegistry, persistence, geolocation, log sink
//! ├── api/            # axum adapter
//! └── utils/          # validators and shortcode generator
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use link_ledger::{database::MemoryStore, services::LinkRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = LinkRegistry::builder(Arc::new(MemoryStore::new())).open().await;
//!     let link = registry.create_link("https://example.com", Some(30), None).await.unwrap();
//!     registry.record_click(&link.shortcode, "direct").await;
//!     registry.shutdown().await;
//! }
//! ```

pub mod config;

pub mod error;

pub mod database;

pub mod models;

pub mod services;

pub mod api;

pub mod utils;

pub use error::Result;

pub use error::AppError;

/// Commonly used items.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::database::{KeyValueStore, MemoryStore, SqliteStore};
    pub use crate::error::{AppError, Result};
    pub use crate::models::*;
    pub use crate::services::*;
}
