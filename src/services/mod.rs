//! # Services
//!
//! ```text
//! ┌──────────────────────┐
//! │      API layer       │  <-- HTTP adapter (axum)
//! ├──────────────────────┤
//! │    LinkRegistry      │  <-- shortcodes, expiry, click ledger
//! ├──────────┬───────────┤
//! │ Persist. │ Geo / Log │  <-- injected collaborators
//! ├──────────┴───────────┤
//! │    KeyValueStore     │  <-- SQLite or memory
//! └──────────────────────┘
//! ```

pub mod geo;
mod logger;
mod persistence;
mod registry;

pub use logger::*;
pub use persistence::*;
pub use registry::*;

use std::sync::Arc;

use crate::{config::Config, database::KeyValueStore};

// =====================================
// Application State
// =====================================
/// State shared by every HTTP handler. Cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub registry: Arc<LinkRegistry>,

    /// Store behind the registry, probed by the health check
    pub store: Arc<dyn KeyValueStore>,
}

impl AppState {
    /// Opens the registry over `store` using `config`.
    pub async fn new(store: Arc<dyn KeyValueStore>, config: Config) -> Self {
        let registry = LinkRegistry::builder(Arc::clone(&store))
            .config(&config)
            .open()
            .await;

        Self::from_parts(Arc::new(config), registry, store)
    }

    #[must_use]
    pub fn from_parts(
        config: Arc<Config>,
        registry: Arc<LinkRegistry>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
