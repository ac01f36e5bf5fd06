//! # Click Geolocation
//!
//! Best-effort enrichment of a click with a coarse location. Resolution runs
//! after the click is recorded and never delays it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{GeoConfig, GeoMode};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeoError {
    /// The location source refused to answer
    #[error("location access denied")]
    Denied,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the location of the current click.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self) -> Result<String, GeoError>;
}

/// Always resolves to the same label (e.g. a deployment region).
#[derive(Debug, Clone)]
pub struct FixedLocationResolver {
    label: String,
}

impl FixedLocationResolver {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

#[async_trait]
impl LocationResolver for FixedLocationResolver {
    async fn resolve(&self) -> Result<String, GeoError> {
        Ok(self.label.clone())
    }
}

/// Resolves to fixed coordinates, rendered with two decimals.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateResolver {
    latitude: f64,
    longitude: f64,
}

impl CoordinateResolver {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[async_trait]
impl LocationResolver for CoordinateResolver {
    async fn resolve(&self) -> Result<String, GeoError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(GeoError::Unavailable("non-finite coordinates".to_string()));
        }
        Ok(format_coordinates(self.latitude, self.longitude))
    }
}

/// `"Lat: 35.69, Lon: 51.39"`
#[must_use]
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("Lat: {:.2}, Lon: {:.2}", latitude, longitude)
}

/// Resolver selected by configuration; `None` when geolocation is disabled.
#[must_use]
pub fn resolver_from_config(config: &GeoConfig) -> Option<Arc<dyn LocationResolver>> {
    match config.mode {
        GeoMode::Disabled => None,
        GeoMode::Fixed => Some(Arc::new(FixedLocationResolver::new(config.label.clone()))),
        GeoMode::Coordinates => Some(Arc::new(CoordinateResolver::new(
            config.latitude,
            config.longitude,
        ))),
    }
}
