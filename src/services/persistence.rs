//! # Persistence Adapter
//!
//! Moves registry snapshots in and out of the `shortenedUrls` key.
//!
//! - Load drops records that have already expired.
//! - Save replaces the previous snapshot; an empty snapshot removes the key.
//! - The `try_*` methods report failures as `LoadFailure` / `SaveFailure`.
//!   The plain methods log those failures and carry on, because in-memory
//!   state stays authoritative for the running process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    database::{KeyValueStore, LINKS_KEY},
    error::{AppError, Result},
    models::LinkRecord,
};

use super::AppLogger;

/// Records read from the store, split by expiry.
#[derive(Debug, Clone, Default)]
pub struct LoadedState {
    /// Records still live, in stored order
    pub records: Vec<LinkRecord>,
    /// Number of stored records dropped because they had expired
    pub expired_dropped: usize,
}

/// Reads and writes registry snapshots under the `shortenedUrls` key.
///
/// Every operation comes in two flavors: `try_*` returns the typed failure,
/// while [`load`](Self::load) and [`save`](Self::save) log it to the
/// [`AppLogger`] and degrade (empty registry, `false`).
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    logger: AppLogger,
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter").finish_non_exhaustive()
    }
}

impl PersistenceAdapter {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, logger: AppLogger) -> Self {
        Self { store, logger }
    }

    /// Backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Reads the stored snapshot and keeps records live at `now`.
    ///
    /// # Errors
    /// [`AppError::LoadFailure`] when the store fails or the value is corrupt.
    pub async fn try_load_at(&self, now: DateTime<Utc>) -> Result<LoadedState> {
        let raw = self
            .store
            .get(LINKS_KEY)
            .await
            .map_err(|e| AppError::LoadFailure(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(LoadedState::default());
        };

        let stored: Vec<LinkRecord> =
            serde_json::from_str(&raw).map_err(|e| AppError::LoadFailure(e.to_string()))?;

        let total = stored.len();
        let records: Vec<LinkRecord> = stored
            .into_iter()
            .filter(|record| !record.is_expired_at(now))
            .collect();

        Ok(LoadedState {
            expired_dropped: total - records.len(),
            records,
        })
    }

    /// [`try_load_at`](Self::try_load_at) evaluated at the current time.
    ///
    /// # Errors
    /// [`AppError::LoadFailure`] when the store fails or the value is corrupt.
    pub async fn try_load(&self) -> Result<LoadedState> {
        self.try_load_at(Utc::now()).await
    }

    /// Live stored records; empty (and logged) on any failure.
    pub async fn load(&self) -> Vec<LinkRecord> {
        match self.try_load().await {
            Ok(state) => {
                if !state.records.is_empty() {
                    self.logger
                        .info(
                            "Initial URLs loaded",
                            json!({
                                "count": state.records.len(),
                                "expiredDropped": state.expired_dropped,
                            }),
                        )
                        .await;
                }
                state.records
            }
            Err(e) => {
                self.logger
                    .error("Failed to load URLs", json!({ "error": e.to_string() }))
                    .await;
                Vec::new()
            }
        }
    }

    /// Writes `records` as the new snapshot.
    ///
    /// # Errors
    /// [`AppError::SaveFailure`] when serialization or the store fails.
    pub async fn try_save(&self, records: &[LinkRecord]) -> Result<()> {
        if records.is_empty() {
            return self
                .store
                .remove(LINKS_KEY)
                .await
                .map_err(|e| AppError::SaveFailure(e.to_string()));
        }

        let json =
            serde_json::to_string(records).map_err(|e| AppError::SaveFailure(e.to_string()))?;

        self.store
            .set(LINKS_KEY, &json)
            .await
            .map_err(|e| AppError::SaveFailure(e.to_string()))
    }

    /// Writes `records`; failures are logged. Returns whether the write succeeded.
    pub async fn save(&self, records: &[LinkRecord]) -> bool {
        match self.try_save(records).await {
            Ok(()) => {
                self.logger
                    .info("URLs saved to storage", json!({ "count": records.len() }))
                    .await;
                true
            }
            Err(e) => {
                self.logger
                    .error("Failed to save URLs", json!({ "error": e.to_string() }))
                    .await;
                false
            }
        }
    }
}
