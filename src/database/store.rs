//! # Key-Value Store
//!
//! A string-keyed store of serialized values. The registry only ever needs
//! whole-value reads and writes: a snapshot replaces the previous one.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::Database;
use crate::error::Result;

/// Key holding the registry snapshot.
pub const LINKS_KEY: &str = "shortenedUrls";

/// Key holding persisted application log entries.
pub const LOGS_KEY: &str = "appLogs";

// =====================================
// Store Trait
// =====================================
/// Durable key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =====================================
// SQLite Store
// =====================================
/// Store backed by the `kv_store` table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.db.health_check().await
    }
}

// =====================================
// Memory Store
// =====================================
/// Process-local store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// =====================================
// Failing Store (tests)
// =====================================
/// Memory store whose operations on one key always fail.
///
/// Every other key behaves like [`MemoryStore`], so the log sink keeps
/// working while the snapshot key is unavailable.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    failing_key: &'static str,
}

#[cfg(test)]
impl FailingStore {
    pub(crate) fn on_key(failing_key: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_key,
        }
    }

    fn check(&self, key: &str) -> Result<()> {
        if key == self.failing_key {
            return Err(crate::error::AppError::Internal(format!(
                "store unavailable for '{}'",
                key
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check(key)?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check(key)?;
        self.inner.remove(key).await
    }
}

// =====================================
// Tests
// =====================================
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_store_only_fails_its_key() {
        let store = FailingStore::on_key(LINKS_KEY);

        assert!(store.get(LINKS_KEY).await.is_err());
        assert!(store.set(LINKS_KEY, "[]").await.is_err());
        assert!(store.remove(LINKS_KEY).await.is_err());

        store.set(LOGS_KEY, "[]").await.unwrap();
        assert_eq!(store.get(LOGS_KEY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();

        assert_eq!(store.get(LINKS_KEY).await.unwrap(), None);

        store.set(LINKS_KEY, "[1]").await.unwrap();
        store.set(LINKS_KEY, "[2]").await.unwrap();
        assert_eq!(store.get(LINKS_KEY).await.unwrap().as_deref(), Some("[2]"));

        store.remove(LINKS_KEY).await.unwrap();
        store.remove(LINKS_KEY).await.unwrap();
        assert!(!store.contains_key(LINKS_KEY).await);
    }

    #[tokio::test]
    async fn test_sqlite_store_upsert_and_remove() {
        let db = Database::in_memory().await.unwrap();
        let store = SqliteStore::new(db);

        store.set(LOGS_KEY, "[]").await.unwrap();
        store.set(LOGS_KEY, r#"[{"level":"INFO"}]"#).await.unwrap();
        assert_eq!(
            store.get(LOGS_KEY).await.unwrap().as_deref(),
            Some(r#"[{"level":"INFO"}]"#)
        );

        store.remove(LOGS_KEY).await.unwrap();
        assert_eq!(store.get(LOGS_KEY).await.unwrap(), None);
        assert!(store.ping().await.is_ok());
    }
}
