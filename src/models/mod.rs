//! # Domain Models
//!
//! - **Entities**: [`LinkRecord`] and [`ClickRecord`], owned by the registry
//!   and persisted as snapshots
//! - **DTOs**: request/response shapes used by the HTTP adapter

mod link;
mod dto;

pub use link::*;
pub use dto::*;

use serde::{Deserialize, Serialize};

// =====================================
// Common Types (Newtype Pattern)
// =====================================
/// Opaque unique identifier.
///
/// # Example
/// ```rust
/// use link_ledger::models::Id;
///
/// let id = Id::new();
/// assert_eq!(id.as_str().len(), 21);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    #[must_use]
    pub fn new() -> Self {
        Self(nanoid::nanoid!(21))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
