//! # Link Registry
//!
//! Owner of every [`LinkRecord`]: allocates shortcodes, enforces expiry and
//! keeps the click ledger.
//!
//! ## Consistency
//! - All mutations run inside a [`Transaction`] holding the state lock. A
//!   transaction either commits a complete change (and flushes a snapshot
//!   while still holding the lock) or is dropped having changed nothing.
//! - Flushes are therefore ordered with mutations and never observe a
//!   partially applied change.
//! - Geolocation results arrive later and patch exactly one click, addressed
//!   by `(link id, click id)`, through the same transaction path.
//!
//! ## Lookup policy
//! [`LinkRegistry::lookup`] returns expired records too.
//! [`LinkRegistry::lookup_live`] is the redirect path and refuses them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::{
    config::Config,
    database::KeyValueStore,
    error::{AppError, Result},
    models::{
        ClickRecord, CreateLinkRequest, Id, LinkRecord, RegistryStats, LOCATION_BLOCKED,
    },
    utils::{self, RandomShortcodeGenerator, ShortcodeGenerator},
};

use super::{
    geo::{resolver_from_config, LocationResolver},
    AppLogger, PersistenceAdapter,
};

// =====================================
// Settings
// =====================================
/// Tunables of a [`LinkRegistry`].
///
/// Usually derived from [`Config`] through `From<&Config>`; tests build them
/// directly to shrink timeouts or retry budgets.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use link_ledger::services::RegistrySettings;
///
/// let settings = RegistrySettings {
///     geolocation_timeout: Duration::from_millis(500),
///     ..RegistrySettings::default()
/// };
/// assert_eq!(settings.default_ttl_minutes, 30);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    /// TTL applied when a create request names none
    pub default_ttl_minutes: i64,

    /// Candidates drawn before random allocation gives up with
    /// [`AppError::GenerationExhausted`]
    pub max_generation_attempts: u32,

    /// Upper bound on one location resolution; on expiry the click keeps
    /// the "Unknown" location
    pub geolocation_timeout: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            default_ttl_minutes: 30,
            max_generation_attempts: 10,
            geolocation_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for RegistrySettings {
    fn from(config: &Config) -> Self {
        Self {
            default_ttl_minutes: config.default_ttl_minutes,
            max_generation_attempts: config.max_generation_attempts,
            geolocation_timeout: config.geolocation.timeout(),
        }
    }
}

/// Result of [`LinkRegistry::record_click`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Click appended; location may still be resolving
    Recorded(ClickRecord),
    /// No record holds the shortcode; nothing changed
    NotFound,
}

impl ClickOutcome {
    /// Whether a click was appended.
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

// =====================================
// State & Transactions
// =====================================
/// Records in creation order. Shortcodes are unique within the list.
#[derive(Debug, Default)]
struct RegistryState {
    links: Vec<LinkRecord>,
}

impl RegistryState {
    /// Builds state from loaded records, keeping the newest record per shortcode.
    fn from_records(records: Vec<LinkRecord>) -> Self {
        let mut links: Vec<LinkRecord> = Vec::with_capacity(records.len());
        for record in records {
            match links.iter().position(|l| l.shortcode == record.shortcode) {
                Some(i) if links[i].created_at > record.created_at => {}
                Some(i) => {
                    links.remove(i);
                    links.push(record);
                }
                None => links.push(record),
            }
        }
        Self { links }
    }

    fn position_by_shortcode(&self, shortcode: &str) -> Option<usize> {
        self.links.iter().position(|link| link.shortcode == shortcode)
    }

    fn find_by_shortcode(&self, shortcode: &str) -> Option<&LinkRecord> {
        self.position_by_shortcode(shortcode).map(|i| &self.links[i])
    }

    fn is_live_key(&self, shortcode: &str, now: DateTime<Utc>) -> bool {
        self.find_by_shortcode(shortcode)
            .map_or(false, |link| !link.is_expired_at(now))
    }
}

/// Exclusive access to registry state for one mutation.
struct Transaction<'a> {
    persistence: &'a PersistenceAdapter,
    state: MutexGuard<'a, RegistryState>,
    dirty: bool,
}

impl Transaction<'_> {
    fn state(&self) -> &RegistryState {
        &self.state
    }

    fn links_mut(&mut self) -> &mut Vec<LinkRecord> {
        self.dirty = true;
        &mut self.state.links
    }

    /// Flushes the full snapshot if anything changed, then releases the lock.
    async fn commit(self) {
        if self.dirty {
            self.persistence.save(&self.state.links).await;
        }
    }
}

// =====================================
// Link Registry
// =====================================
/// Shortcode registry and click ledger.
///
/// Holds every [`LinkRecord`] in creation order behind one async mutex and
/// writes a full snapshot to the [`KeyValueStore`] after each committed
/// mutation. In-memory state is authoritative: a failed write is logged
/// and the operation still succeeds.
///
/// Shared as `Arc<LinkRegistry>`; [`LinkRegistry::record_click`] needs the
/// `Arc` to hand background location updates their own reference.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use link_ledger::{database::MemoryStore, services::LinkRegistry};
///
/// # async fn demo() -> link_ledger::Result<()> {
/// let registry = LinkRegistry::builder(Arc::new(MemoryStore::new())).open().await;
///
/// let link = registry.create_link("https://example.com", Some(60), Some("promo")).await?;
/// registry.record_click(&link.shortcode, "direct").await;
///
/// assert_eq!(registry.lookup("promo").await.map(|l| l.clicks.len()), Some(1));
/// registry.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct LinkRegistry {
    state: Mutex<RegistryState>,
    persistence: PersistenceAdapter,
    logger: AppLogger,
    generator: Box<dyn ShortcodeGenerator>,
    resolver: Option<Arc<dyn LocationResolver>>,
    settings: RegistrySettings,
    pending_locations: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRegistry")
            .field("settings", &self.settings)
            .field("geolocation", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

impl LinkRegistry {
    /// Starts building a registry persisted in `store`.
    #[must_use]
    pub fn builder(store: Arc<dyn KeyValueStore>) -> RegistryBuilder {
        RegistryBuilder::new(store)
    }

    /// Settings the registry was opened with.
    #[must_use]
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Log sink shared with the persistence adapter; its entries live under
    /// the `appLogs` key of the same store.
    #[must_use]
    pub fn logger(&self) -> &AppLogger {
        &self.logger
    }

    async fn begin(&self) -> Transaction<'_> {
        Transaction {
            persistence: &self.persistence,
            state: self.state.lock().await,
            dirty: false,
        }
    }

    // ----------------------------------------
    // Create
    // ----------------------------------------

    /// Creates a link for `long_url`.
    ///
    /// `ttl_minutes` defaults to the configured TTL. An empty or absent
    /// `custom_shortcode` means a random one is allocated.
    ///
    /// # Errors
    /// - [`AppError::InvalidUrl`] / [`AppError::InvalidTtl`] /
    ///   [`AppError::InvalidShortcode`]: malformed input
    /// - [`AppError::ShortcodeTaken`]: custom code held by a live record
    /// - [`AppError::GenerationExhausted`]: no free code within the retry budget
    ///
    /// The registry is unchanged whenever an error is returned.
    #[instrument(skip(self, long_url), fields(long_url = %utils::preview_url(long_url)))]
    pub async fn create_link(
        &self,
        long_url: &str,
        ttl_minutes: Option<i64>,
        custom_shortcode: Option<&str>,
    ) -> Result<LinkRecord> {
        let result = self.try_create(long_url, ttl_minutes, custom_shortcode).await;

        match &result {
            Ok(record) => {
                self.logger
                    .info(
                        "URL shortened",
                        json!({
                            "shortcode": record.shortcode,
                            "longUrl": utils::preview_url(long_url),
                            "validityMinutes": record.ttl_minutes(),
                        }),
                    )
                    .await;
            }
            Err(e) => {
                self.logger
                    .error(
                        "URL shortening failed",
                        json!({
                            "error": e.to_string(),
                            "longUrl": utils::preview_url(long_url),
                            "customShortcode": custom_shortcode.unwrap_or_default(),
                        }),
                    )
                    .await;
            }
        }

        result
    }

    async fn try_create(
        &self,
        long_url: &str,
        ttl_minutes: Option<i64>,
        custom_shortcode: Option<&str>,
    ) -> Result<LinkRecord> {
        if !utils::validate_url(long_url) {
            return Err(AppError::InvalidUrl(long_url.to_string()));
        }

        let ttl = ttl_minutes.unwrap_or(self.settings.default_ttl_minutes);
        if !utils::validate_ttl_minutes(ttl) {
            return Err(AppError::InvalidTtl(ttl));
        }

        let custom = custom_shortcode.filter(|code| !code.is_empty());
        if let Some(code) = custom {
            if !utils::validate_shortcode(code) {
                return Err(AppError::InvalidShortcode(code.to_string()));
            }
        }

        let created_at = Utc::now();
        let expires_at = chrono::Duration::try_minutes(ttl)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .ok_or(AppError::InvalidTtl(ttl))?;

        let mut txn = self.begin().await;

        let shortcode = match custom {
            Some(code) => {
                if txn.state().is_live_key(code, created_at) {
                    return Err(AppError::ShortcodeTaken(code.to_string()));
                }
                code.to_string()
            }
            None => self.allocate_shortcode(txn.state(), created_at)?,
        };

        let record = LinkRecord {
            id: Id::new(),
            long_url: long_url.to_string(),
            shortcode,
            created_at,
            expires_at,
            clicks: Vec::new(),
        };

        let links = txn.links_mut();
        // an expired holder of the same code gives way to the new record
        links.retain(|link| link.shortcode != record.shortcode);
        links.push(record.clone());
        txn.commit().await;

        Ok(record)
    }

    /// Draws candidates until one is not held by a live record.
    fn allocate_shortcode(&self, state: &RegistryState, now: DateTime<Utc>) -> Result<String> {
        let attempts = self.settings.max_generation_attempts;

        for attempt in 1..=attempts {
            let candidate = self.generator.generate();
            if !state.is_live_key(&candidate, now) {
                return Ok(candidate);
            }
            debug!(attempt, candidate = %candidate, "Shortcode collision");
        }

        Err(AppError::GenerationExhausted(attempts))
    }

    /// Creates each requested link independently, in order.
    pub async fn create_links(&self, requests: &[CreateLinkRequest]) -> Vec<Result<LinkRecord>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(
                self.create_link(
                    &request.long_url,
                    request.ttl_minutes,
                    request.custom_shortcode.as_deref(),
                )
                .await,
            );
        }
        results
    }

    // ----------------------------------------
    // Clicks
    // ----------------------------------------

    /// Appends a click to the record holding `shortcode`.
    ///
    /// The click starts with the "Unknown" location. When a resolver is
    /// configured, resolution runs in the background and patches this click
    /// once it settles; expiry does not prevent recording.
    #[instrument(skip(self))]
    pub async fn record_click(self: &Arc<Self>, shortcode: &str, source: &str) -> ClickOutcome {
        let mut txn = self.begin().await;
        let Some(index) = txn.state().position_by_shortcode(shortcode) else {
            drop(txn);
            self.logger
                .info("Short URL not found", json!({ "shortcode": shortcode }))
                .await;
            return ClickOutcome::NotFound;
        };

        // stamped under the lock so ledger order matches timestamp order
        let click = ClickRecord::new(source);
        let link = &mut txn.links_mut()[index];
        link.clicks.push(click.clone());
        let link_id = link.id.clone();
        txn.commit().await;

        self.logger
            .info(
                "URL click recorded",
                json!({ "shortcode": shortcode, "clickData": click }),
            )
            .await;

        if let Some(resolver) = &self.resolver {
            self.spawn_location_update(Arc::clone(resolver), link_id, click.id.clone())
                .await;
        }

        ClickOutcome::Recorded(click)
    }

    async fn spawn_location_update(
        self: &Arc<Self>,
        resolver: Arc<dyn LocationResolver>,
        link_id: Id,
        click_id: Id,
    ) {
        let registry = Arc::clone(self);
        let timeout = self.settings.geolocation_timeout;

        let handle = tokio::spawn(async move {
            let location = match tokio::time::timeout(timeout, resolver.resolve()).await {
                Ok(Ok(location)) => location,
                Ok(Err(e)) => {
                    debug!(error = %e, click_id = %click_id, "Location resolution denied");
                    LOCATION_BLOCKED.to_string()
                }
                Err(_) => {
                    warn!(click_id = %click_id, "Location resolution timed out");
                    return;
                }
            };

            registry.apply_location(&link_id, &click_id, location).await;
        });

        let mut pending = self.pending_locations.lock().await;
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Sets the location of one click if it is still unresolved.
    ///
    /// Returns `false` when the link or click no longer exists or the
    /// location was already set; those updates are discarded.
    pub async fn apply_location(&self, link_id: &Id, click_id: &Id, location: String) -> bool {
        let mut txn = self.begin().await;

        let Some(index) = txn.state().links.iter().position(|link| &link.id == link_id) else {
            debug!(link_id = %link_id, "Discarding location for deleted link");
            return false;
        };

        let applied = match txn.links_mut()[index].find_click_mut(click_id) {
            Some(click) if click.is_location_pending() => {
                click.location = location;
                true
            }
            _ => false,
        };

        if applied {
            txn.commit().await;
        }
        applied
    }

    /// Waits for every in-flight location update to finish.
    pub async fn settle_locations(&self) {
        loop {
            let handles = std::mem::take(&mut *self.pending_locations.lock().await);
            if handles.is_empty() {
                break;
            }

            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Location update task failed");
                }
            }
        }
    }

    // ----------------------------------------
    // Queries
    // ----------------------------------------

    /// Record holding `shortcode`, expired or not.
    pub async fn lookup(&self, shortcode: &str) -> Option<LinkRecord> {
        self.state.lock().await.find_by_shortcode(shortcode).cloned()
    }

    /// Record holding `shortcode` if it may be redirected to.
    ///
    /// # Errors
    /// [`AppError::NotFound`] if absent, [`AppError::LinkExpired`] if expired.
    pub async fn lookup_live(&self, shortcode: &str) -> Result<LinkRecord> {
        let record = self
            .lookup(shortcode)
            .await
            .ok_or_else(|| AppError::shortcode_not_found(shortcode))?;

        if record.is_expired() {
            return Err(AppError::LinkExpired(shortcode.to_string()));
        }
        Ok(record)
    }

    /// All records, live and expired, in creation order.
    pub async fn list_all(&self) -> Vec<LinkRecord> {
        self.state.lock().await.links.clone()
    }

    /// Number of records held, live and expired.
    pub async fn len(&self) -> usize {
        self.state.lock().await.links.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Link and click counts, with liveness evaluated once at call time.
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.lock().await;
        let now = Utc::now();

        let live_links = state
            .links
            .iter()
            .filter(|link| !link.is_expired_at(now))
            .count();

        RegistryStats {
            total_links: state.links.len(),
            live_links,
            expired_links: state.links.len() - live_links,
            total_clicks: state.links.iter().map(LinkRecord::click_count).sum(),
        }
    }

    // ----------------------------------------
    // Delete & Maintenance
    // ----------------------------------------

    /// Removes the record with `id`. Returns whether one was removed;
    /// deleting an absent id is not an error.
    #[instrument(skip(self))]
    pub async fn delete_link(&self, id: &str) -> bool {
        let mut txn = self.begin().await;

        if !txn.state().links.iter().any(|link| link.id == *id) {
            return false;
        }

        txn.links_mut().retain(|link| link.id != *id);
        txn.commit().await;

        self.logger.info("URL deleted", json!({ "id": id })).await;
        true
    }

    /// Drops every expired record. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut txn = self.begin().await;

        let before = txn.state().links.len();
        let expired = txn
            .state()
            .links
            .iter()
            .filter(|link| link.is_expired_at(now))
            .count();
        if expired == 0 {
            return 0;
        }

        txn.links_mut().retain(|link| !link.is_expired_at(now));
        let removed = before - txn.state().links.len();
        txn.commit().await;

        self.logger
            .info("Expired URLs purged", json!({ "count": removed }))
            .await;
        removed
    }

    /// Writes the current snapshot. Returns whether the write succeeded.
    pub async fn flush(&self) -> bool {
        let state = self.state.lock().await;
        self.persistence.save(&state.links).await
    }

    /// Settles pending location updates and writes a final snapshot.
    pub async fn shutdown(&self) -> bool {
        self.settle_locations().await;
        self.flush().await
    }
}

// =====================================
// Builder
// =====================================
/// Builder for [`LinkRegistry`].
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use link_ledger::{database::MemoryStore, services::LinkRegistry};
///
/// # async fn demo() {
/// let registry = LinkRegistry::builder(Arc::new(MemoryStore::new())).open().await;
/// let link = registry.create_link("https://example.com", None, None).await.unwrap();
/// assert_eq!(link.shortcode.len(), 6);
/// # }
/// ```
pub struct RegistryBuilder {
    store: Arc<dyn KeyValueStore>,
    generator: Box<dyn ShortcodeGenerator>,
    resolver: Option<Arc<dyn LocationResolver>>,
    settings: RegistrySettings,
    max_log_entries: usize,
}

impl RegistryBuilder {
    /// Defaults: random generator, no resolver, [`RegistrySettings::default`]
    /// and a 1000-entry log cap.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            generator: Box::new(RandomShortcodeGenerator),
            resolver: None,
            settings: RegistrySettings::default(),
            max_log_entries: 1000,
        }
    }

    /// Applies settings, resolver and log capacity from `config`.
    #[must_use]
    pub fn config(mut self, config: &Config) -> Self {
        self.settings = RegistrySettings::from(config);
        self.resolver = resolver_from_config(&config.geolocation);
        self.max_log_entries = config.max_log_entries;
        self
    }

    /// Replaces the random shortcode generator.
    #[must_use]
    pub fn generator(mut self, generator: impl ShortcodeGenerator + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    /// Enables background location resolution for recorded clicks.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn LocationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Disables location resolution; clicks keep the "Unknown" location.
    #[must_use]
    pub fn without_resolver(mut self) -> Self {
        self.resolver = None;
        self
    }

    /// Overrides TTL, retry budget and resolution timeout.
    #[must_use]
    pub fn settings(mut self, settings: RegistrySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Cap on persisted `appLogs` entries. `0` keeps tracing output only.
    #[must_use]
    pub fn max_log_entries(mut self, entries: usize) -> Self {
        self.max_log_entries = entries;
        self
    }

    /// Loads live records from the store and returns the shared registry.
    ///
    /// Load failures leave the registry empty; they never abort startup.
    pub async fn open(self) -> Arc<LinkRegistry> {
        let logger = AppLogger::new(Arc::clone(&self.store), self.max_log_entries);
        let persistence = PersistenceAdapter::new(self.store, logger.clone());

        let records = persistence.load().await;

        Arc::new(LinkRegistry {
            state: Mutex::new(RegistryState::from_records(records)),
            persistence,
            logger,
            generator: self.generator,
            resolver: self.resolver,
            settings: self.settings,
            pending_locations: Mutex::new(Vec::new()),
        })
    }
}

// =====================================
// Tests
// =====================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{FailingStore, MemoryStore, LINKS_KEY};
    use crate::models::{LOCATION_UNKNOWN, SOURCE_DIRECT};
    use crate::services::geo::{GeoError, MockLocationResolver};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Hands out a fixed sequence of candidates, then repeats the last one.
    struct SequenceGenerator(StdMutex<VecDeque<String>>);

    impl SequenceGenerator {
        fn new(codes: &[&str]) -> Self {
            Self(StdMutex::new(codes.iter().map(|c| c.to_string()).collect()))
        }
    }

    impl ShortcodeGenerator for SequenceGenerator {
        fn generate(&self) -> String {
            let mut codes = self.0.lock().unwrap();
            if codes.len() > 1 {
                codes.pop_front().unwrap()
            } else {
                codes.front().cloned().unwrap()
            }
        }
    }

    struct SlowResolver;

    #[async_trait::async_trait]
    impl LocationResolver for SlowResolver {
        async fn resolve(&self) -> std::result::Result<String, GeoError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    async fn open(store: Arc<MemoryStore>) -> Arc<LinkRegistry> {
        LinkRegistry::builder(store).open().await
    }

    #[tokio::test]
    async fn test_create_link_defaults() {
        let registry = open(Arc::new(MemoryStore::new())).await;

        let link = registry.create_link("https://example.com", None, Some("")).await.unwrap();

        assert_eq!(link.shortcode.len(), 6);
        assert!(link.shortcode.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(link.expires_at - link.created_at, chrono::Duration::minutes(30));
        assert!(link.clicks.is_empty());
        assert_eq!(registry.lookup(&link.shortcode).await, Some(link));
    }

    #[tokio::test]
    async fn test_invalid_input_leaves_registry_unchanged() {
        let registry = open(Arc::new(MemoryStore::new())).await;

        assert!(matches!(
            registry.create_link("not-a-url", Some(30), None).await,
            Err(AppError::InvalidUrl(_))
        ));
        assert!(matches!(
            registry.create_link("https://example.com", Some(0), None).await,
            Err(AppError::InvalidTtl(0))
        ));
        assert!(matches!(
            registry.create_link("https://example.com", Some(i64::MAX), None).await,
            Err(AppError::InvalidTtl(_))
        ));
        assert!(matches!(
            registry.create_link("https://example.com", None, Some("a b")).await,
            Err(AppError::InvalidShortcode(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_custom_shortcode_taken() {
        let registry = open(Arc::new(MemoryStore::new())).await;

        registry
            .create_link("https://example.com/a", None, Some("promo"))
            .await
            .unwrap();
        let second = registry
            .create_link("https://example.com/b", None, Some("promo"))
            .await;

        assert!(matches!(second, Err(AppError::ShortcodeTaken(code)) if code == "promo"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_generation_retries_on_collision() {
        let store = Arc::new(MemoryStore::new());
        let registry = LinkRegistry::builder(store)
            .generator(SequenceGenerator::new(&["AAAAAA", "AAAAAA", "BBBBBB"]))
            .open()
            .await;

        let first = registry.create_link("https://a.example", None, None).await.unwrap();
        let second = registry.create_link("https://b.example", None, None).await.unwrap();

        assert_eq!(first.shortcode, "AAAAAA");
        assert_eq!(second.shortcode, "BBBBBB");
    }

    #[tokio::test]
    async fn test_generation_exhausted() {
        let registry = LinkRegistry::builder(Arc::new(MemoryStore::new()))
            .generator(SequenceGenerator::new(&["SAME01"]))
            .settings(RegistrySettings {
                max_generation_attempts: 3,
                ..RegistrySettings::default()
            })
            .open()
            .await;

        registry.create_link("https://a.example", None, None).await.unwrap();
        let result = registry.create_link("https://b.example", None, None).await;

        assert!(matches!(result, Err(AppError::GenerationExhausted(3))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_holder_gives_way() {
        let store = Arc::new(MemoryStore::new());
        let registry = open(store).await;
        let link = registry.create_link("https://old.example", Some(1), Some("reuse")).await.unwrap();

        // age the record past its expiry
        {
            let mut state = registry.state.lock().await;
            state.links[0].created_at = link.created_at - chrono::Duration::minutes(10);
            state.links[0].expires_at = link.created_at - chrono::Duration::minutes(9);
        }

        let fresh = registry
            .create_link("https://new.example", Some(5), Some("reuse"))
            .await
            .unwrap();

        let all = registry.list_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, fresh.id);
    }

    #[tokio::test]
    async fn test_clicks_accumulate_in_order() {
        let registry = open(Arc::new(MemoryStore::new())).await;
        registry.create_link("https://example.com", None, Some("ABC123")).await.unwrap();

        for source in ["direct", "stats-page", "direct"] {
            assert!(registry.record_click("ABC123", source).await.is_recorded());
        }

        let link = registry.lookup("ABC123").await.unwrap();
        let sources: Vec<&str> = link.clicks.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["direct", "stats-page", "direct"]);
        assert!(link.clicks.iter().all(|c| c.location == LOCATION_UNKNOWN));
    }

    #[tokio::test]
    async fn test_click_on_unknown_shortcode() {
        let store = Arc::new(MemoryStore::new());
        let registry = open(store.clone()).await;

        assert_eq!(registry.record_click("nope", SOURCE_DIRECT).await, ClickOutcome::NotFound);
        assert!(!store.contains_key(LINKS_KEY).await);
    }

    #[tokio::test]
    async fn test_location_is_patched_after_resolution() {
        let mut resolver = MockLocationResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|| Ok("Lat: 35.69, Lon: 51.39".to_string()));

        let registry = LinkRegistry::builder(Arc::new(MemoryStore::new()))
            .resolver(Arc::new(resolver))
            .open()
            .await;
        registry.create_link("https://example.com", None, Some("geo1")).await.unwrap();

        let ClickOutcome::Recorded(click) = registry.record_click("geo1", SOURCE_DIRECT).await else {
            panic!("click should be recorded");
        };
        assert_eq!(click.location, LOCATION_UNKNOWN);

        registry.settle_locations().await;
        let link = registry.lookup("geo1").await.unwrap();
        assert_eq!(link.clicks[0].location, "Lat: 35.69, Lon: 51.39");
    }

    #[tokio::test]
    async fn test_denied_resolution_marks_location_blocked() {
        let mut resolver = MockLocationResolver::new();
        resolver.expect_resolve().returning(|| Err(GeoError::Denied));

        let registry = LinkRegistry::builder(Arc::new(MemoryStore::new()))
            .resolver(Arc::new(resolver))
            .open()
            .await;
        registry.create_link("https://example.com", None, Some("geo2")).await.unwrap();
        registry.record_click("geo2", SOURCE_DIRECT).await;
        registry.settle_locations().await;

        let link = registry.lookup("geo2").await.unwrap();
        assert_eq!(link.clicks[0].location, LOCATION_BLOCKED);
    }

    #[tokio::test]
    async fn test_timed_out_resolution_stays_unknown() {
        let registry = LinkRegistry::builder(Arc::new(MemoryStore::new()))
            .resolver(Arc::new(SlowResolver))
            .settings(RegistrySettings {
                geolocation_timeout: Duration::from_millis(20),
                ..RegistrySettings::default()
            })
            .open()
            .await;
        registry.create_link("https://example.com", None, Some("slow")).await.unwrap();
        registry.record_click("slow", SOURCE_DIRECT).await;
        registry.settle_locations().await;

        let link = registry.lookup("slow").await.unwrap();
        assert_eq!(link.clicks[0].location, LOCATION_UNKNOWN);
    }

    #[tokio::test]
    async fn test_location_for_deleted_link_is_discarded() {
        let registry = open(Arc::new(MemoryStore::new())).await;
        let link = registry.create_link("https://example.com", None, Some("gone")).await.unwrap();
        let ClickOutcome::Recorded(click) = registry.record_click("gone", SOURCE_DIRECT).await else {
            panic!("click should be recorded");
        };

        assert!(registry.delete_link(link.id.as_str()).await);
        assert!(!registry.apply_location(&link.id, &click.id, "Somewhere".to_string()).await);
    }

    #[tokio::test]
    async fn test_location_patch_is_idempotent() {
        let registry = open(Arc::new(MemoryStore::new())).await;
        let link = registry.create_link("https://example.com", None, Some("once")).await.unwrap();
        let ClickOutcome::Recorded(click) = registry.record_click("once", SOURCE_DIRECT).await else {
            panic!("click should be recorded");
        };

        assert!(registry.apply_location(&link.id, &click.id, "First".to_string()).await);
        assert!(!registry.apply_location(&link.id, &click.id, "Second".to_string()).await);
        assert_eq!(registry.lookup("once").await.unwrap().clicks[0].location, "First");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let registry = open(Arc::new(MemoryStore::new())).await;
        let link = registry.create_link("https://example.com", None, None).await.unwrap();

        assert!(registry.delete_link(link.id.as_str()).await);
        assert!(!registry.delete_link(link.id.as_str()).await);
        assert!(registry.lookup(&link.shortcode).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_live_rejects_expired() {
        let registry = open(Arc::new(MemoryStore::new())).await;
        registry.create_link("https://example.com", Some(1), Some("brief")).await.unwrap();
        {
            let mut state = registry.state.lock().await;
            state.links[0].expires_at = Utc::now() - chrono::Duration::seconds(1);
        }

        assert!(registry.lookup("brief").await.is_some());
        assert!(matches!(registry.lookup_live("brief").await, Err(AppError::LinkExpired(_))));
        assert!(matches!(registry.lookup_live("other").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_purge_and_stats() {
        let registry = open(Arc::new(MemoryStore::new())).await;
        registry.create_link("https://a.example", None, Some("keep")).await.unwrap();
        registry.create_link("https://b.example", None, Some("drop")).await.unwrap();
        registry.record_click("keep", SOURCE_DIRECT).await;
        {
            let mut state = registry.state.lock().await;
            state.links[1].expires_at = Utc::now() - chrono::Duration::seconds(1);
        }

        let stats = registry.stats().await;
        assert_eq!(stats, RegistryStats {
            total_links: 2,
            live_links: 1,
            expired_links: 1,
            total_clicks: 1,
        });

        assert_eq!(registry.purge_expired().await, 1);
        assert_eq!(registry.purge_expired().await, 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let store = Arc::new(MemoryStore::new());
        let registry = open(store.clone()).await;
        registry.create_link("https://example.com", None, Some("persist")).await.unwrap();
        registry.record_click("persist", SOURCE_DIRECT).await;
        let before = registry.list_all().await;

        let reopened = open(store).await;
        assert_eq!(reopened.list_all().await, before);
    }

    #[tokio::test]
    async fn test_duplicate_loaded_shortcodes_keep_newest() {
        let now = Utc::now();
        let older = LinkRecord {
            id: Id::from("old"),
            long_url: "https://old.example".to_string(),
            shortcode: "dup123".to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::minutes(30),
            clicks: Vec::new(),
        };
        let newer = LinkRecord {
            id: Id::from("new"),
            ..older.clone()
        };

        let state = RegistryState::from_records(vec![older.clone(), newer.clone()]);
        assert_eq!(state.links.len(), 1);
        assert_eq!(state.links[0].id.as_str(), "new");

        let stale = LinkRecord {
            id: Id::from("stale"),
            created_at: now - chrono::Duration::minutes(5),
            ..older
        };
        let state = RegistryState::from_records(vec![newer, stale]);
        assert_eq!(state.links[0].id.as_str(), "new");
    }

    #[tokio::test]
    async fn test_save_failure_keeps_memory_authoritative() {
        let registry = LinkRegistry::builder(Arc::new(FailingStore::on_key(LINKS_KEY)))
            .open()
            .await;

        let link = registry
            .create_link("https://example.com", None, Some("kept"))
            .await
            .unwrap();
        assert!(registry.record_click("kept", SOURCE_DIRECT).await.is_recorded());

        let stored = registry.lookup("kept").await.unwrap();
        assert_eq!(stored.id, link.id);
        assert_eq!(stored.clicks.len(), 1);
        assert!(!registry.flush().await);

        let entries = registry.logger().entries().await.unwrap();
        let failures = entries
            .iter()
            .filter(|e| e.message == "Failed to save URLs")
            .count();
        assert!(failures >= 2);
        assert!(entries.iter().any(|e| e.message == "URL shortened"));
    }

    #[tokio::test]
    async fn test_load_failure_opens_empty_registry() {
        let registry = LinkRegistry::builder(Arc::new(FailingStore::on_key(LINKS_KEY)))
            .open()
            .await;

        assert!(registry.is_empty().await);
        let entries = registry.logger().entries().await.unwrap();
        assert!(entries.iter().any(|e| e.message == "Failed to load URLs"));
    }

    #[tokio::test]
    async fn test_concurrent_clicks_are_ordered_by_timestamp() {
        let registry = open(Arc::new(MemoryStore::new())).await;
        registry.create_link("https://example.com", None, Some("busy")).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.record_click("busy", SOURCE_DIRECT).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_recorded());
        }

        let clicks = registry.lookup("busy").await.unwrap().clicks;
        assert_eq!(clicks.len(), 16);
        assert!(clicks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
