//! # Application Log Sink
//!
//! `log(level, message, data)` entries go to `tracing` and are also appended to
//! the `appLogs` key so they survive restarts. The persisted list is capped to
//! the most recent entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::database::{KeyValueStore, LOGS_KEY};

/// Severity of a log entry, persisted in upper case (`"INFO"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

/// One persisted log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub data: Value,
}

/// Log sink shared by the registry and the persistence adapter.
///
/// Cloning shares the store and the write lock, so appends from every clone
/// are serialized against each other.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use serde_json::json;
/// use link_ledger::{database::MemoryStore, services::AppLogger};
///
/// # async fn demo() {
/// let logger = AppLogger::new(Arc::new(MemoryStore::new()), 100);
/// logger.info("URL shortened", json!({ "shortcode": "abc123" })).await;
/// assert_eq!(logger.entries().await.unwrap().len(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct AppLogger {
    store: Arc<dyn KeyValueStore>,
    max_entries: usize,
    // serializes the read-modify-write of the appLogs value
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for AppLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLogger")
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}

impl AppLogger {
    /// Sink writing to `store`, keeping at most `max_entries` persisted entries.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, max_entries: usize) -> Self {
        Self {
            store,
            max_entries,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Emits a tracing event and appends the entry to `appLogs`.
    ///
    /// Store failures are traced and otherwise ignored.
    pub async fn log(&self, level: LogLevel, message: &str, data: Value) {
        match level {
            LogLevel::Error => error!(data = %data, "{}", message),
            LogLevel::Warning => warn!(data = %data, "{}", message),
            LogLevel::Info => info!(data = %data, "{}", message),
            LogLevel::Debug => debug!(data = %data, "{}", message),
        }

        if self.max_entries == 0 {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            data,
        };

        if let Err(e) = self.append(entry).await {
            warn!(error = %e, "Failed to persist log entry");
        }
    }

    pub async fn error(&self, message: &str, data: Value) {
        self.log(LogLevel::Error, message, data).await;
    }

    pub async fn warning(&self, message: &str, data: Value) {
        self.log(LogLevel::Warning, message, data).await;
    }

    pub async fn info(&self, message: &str, data: Value) {
        self.log(LogLevel::Info, message, data).await;
    }

    pub async fn debug(&self, message: &str, data: Value) {
        self.log(LogLevel::Debug, message, data).await;
    }

    /// Persisted entries, oldest first.
    ///
    /// A missing or corrupt `appLogs` value reads as empty; only a store
    /// error is reported.
    ///
    /// # Errors
    /// Whatever the underlying [`KeyValueStore::get`] returns.
    pub async fn entries(&self) -> crate::Result<Vec<LogEntry>> {
        let raw = self.store.get(LOGS_KEY).await?;
        Ok(raw
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default())
    }

    async fn append(&self, entry: LogEntry) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.entries().await?;
        entries.push(entry);

        if entries.len() > self.max_entries {
            let overflow = entries.len() - self.max_entries;
            entries.drain(..overflow);
        }

        let json = serde_json::to_string(&entries)?;
        self.store.set(LOGS_KEY, &json).await
    }
}
