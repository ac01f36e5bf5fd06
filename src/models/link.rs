//! # Link and Click Records
//!
//! The unit of shortening and its append-only click ledger. Both serialize
//! with camelCase keys and RFC 3339 timestamps, which is the layout stored
//! under the `shortenedUrls` key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Location of a click whose resolution has not settled (or never will).
pub const LOCATION_UNKNOWN: &str = "Unknown";

/// Location of a click whose resolution was denied or failed.
pub const LOCATION_BLOCKED: &str = "Location blocked";

/// Click source used by the redirect path.
pub const SOURCE_DIRECT: &str = "direct";

/// Click source used when a link is opened from a statistics listing.
pub const SOURCE_STATS_PAGE: &str = "stats-page";

// =====================================
// Link Record
// =====================================
/// A long URL bound to a shortcode, with its expiry and click history.
///
/// Only the registry creates records; afterwards they change only by
/// appending clicks (and patching a click's location) or by deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    /// Stable identity, used for deletion and location patches
    pub id: Id,

    /// Destination, validated as an absolute URL at creation
    pub long_url: String,

    /// Unique among live records; `^[A-Za-z0-9_-]{4,20}$`
    pub shortcode: String,

    pub created_at: DateTime<Utc>,

    /// Always later than `created_at`
    pub expires_at: DateTime<Utc>,

    /// Append-only, in click order
    #[serde(default)]
    pub clicks: Vec<ClickRecord>,
}

impl LinkRecord {
    /// Whether the record is expired at `now`.
    ///
    /// A record is live strictly before `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// [`is_expired_at`](Self::is_expired_at) evaluated now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the record may still be redirected to.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.is_expired()
    }

    /// Time-to-live the record was created with, in whole minutes.
    #[must_use]
    pub fn ttl_minutes(&self) -> i64 {
        (self.expires_at - self.created_at).num_minutes()
    }

    #[must_use]
    pub fn click_count(&self) -> usize {
        self.clicks.len()
    }

    /// Public short URL under `base_url`.
    ///
    /// ```rust
    /// # use chrono::Utc;
    /// # use link_ledger::models::{Id, LinkRecord};
    /// # let now = Utc::now();
    /// let record = LinkRecord {
    ///     id: Id::new(),
    ///     long_url: "https://example.com".to_string(),
    ///     shortcode: "abc123".to_string(),
    ///     created_at: now,
    ///     expires_at: now + chrono::Duration::minutes(30),
    ///     clicks: Vec::new(),
    /// };
    /// assert_eq!(record.short_url("http://sho.rt/"), "http://sho.rt/abc123");
    /// ```
    #[must_use]
    pub fn short_url(&self, base_url: &str) -> String {
        crate::utils::short_url(base_url, &self.shortcode)
    }

    pub(crate) fn find_click_mut(&mut self, click_id: &Id) -> Option<&mut ClickRecord> {
        self.clicks.iter_mut().find(|click| &click.id == click_id)
    }
}

// =====================================
// Click Record
// =====================================
/// One observed access of a shortcode.
///
/// `id` is assigned at append time so a late location update can target
/// exactly this click. Snapshots written before clicks carried ids get a
/// fresh one on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    #[serde(default)]
    pub id: Id,

    /// Taken while the registry lock is held
    pub timestamp: DateTime<Utc>,

    /// Where the click came from, e.g. "direct" or "stats-page"
    pub source: String,

    /// "Unknown" until resolution settles
    #[serde(default = "default_location")]
    pub location: String,
}

fn default_location() -> String {
    LOCATION_UNKNOWN.to_string()
}

impl ClickRecord {
    /// New click stamped now, with an unresolved location.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            timestamp: Utc::now(),
            source: source.into(),
            location: default_location(),
        }
    }

    /// Whether a location update may still be applied.
    #[must_use]
    pub fn is_location_pending(&self) -> bool {
        self.location == LOCATION_UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(created_at: DateTime<Utc>, ttl: Duration) -> LinkRecord {
        LinkRecord {
            id: Id::new(),
            long_url: "https://example.com".to_string(),
            shortcode: "abc123".to_string(),
            created_at,
            expires_at: created_at + ttl,
            clicks: Vec::new(),
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let link = record(now, Duration::minutes(30));

        assert!(!link.is_expired_at(now));
        assert!(!link.is_expired_at(now + Duration::minutes(29)));
        assert!(link.is_expired_at(now + Duration::minutes(30)));
        assert_eq!(link.ttl_minutes(), 30);
    }

    #[test]
    fn test_serialized_layout_uses_camel_case() {
        let mut link = record(Utc::now(), Duration::minutes(5));
        link.clicks.push(ClickRecord::new(SOURCE_DIRECT));

        let json = serde_json::to_value(&link).unwrap();
        assert!(json.get("longUrl").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("expiresAt").is_some());
        assert_eq!(json["clicks"][0]["location"], LOCATION_UNKNOWN);
        assert_eq!(json["clicks"][0]["source"], SOURCE_DIRECT);
    }

    #[test]
    fn test_legacy_click_without_id_or_location() {
        let json = r#"{"timestamp":"2024-05-01T10:00:00.000Z","source":"direct"}"#;
        let click: ClickRecord = serde_json::from_str(json).unwrap();

        assert_eq!(click.location, LOCATION_UNKNOWN);
        assert_eq!(click.id.as_str().len(), 21);
    }

    #[test]
    fn test_find_click_mut() {
        let mut link = record(Utc::now(), Duration::minutes(5));
        let click = ClickRecord::new(SOURCE_STATS_PAGE);
        let click_id = click.id.clone();
        link.clicks.push(click);

        assert!(link.find_click_mut(&click_id).is_some());
        assert!(link.find_click_mut(&Id::new()).is_none());
        assert_eq!(link.short_url("http://sho.rt"), "http://sho.rt/abc123");
    }
}
