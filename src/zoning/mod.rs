//! Zoning classification lookup.
//!
//! A location's zoning comes from a map service that exposes one layer per
//! plan dataset. Each layer is queried independently: a layer that is outside
//! its extent, fails, or times out is skipped and reported, and never aborts
//! the others.

pub mod wms;

use crate::types::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub use wms::WmsClient;

/// Flat key/value record describing one map feature.
pub type FeatureProperties = serde_json::Map<String, serde_json::Value>;

/// Feature records per layer name.
pub type LayerProperties = BTreeMap<String, Vec<FeatureProperties>>;

/// A point of interest, with the half-width of the lookup box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
    pub margin: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64, margin: f64) -> Self {
        Self { lat, lon, margin }
    }

    /// WMS 1.1.1 bbox string: `min_lon,min_lat,max_lon,max_lat`.
    pub fn bbox(&self) -> String {
        format!(
            "{},{},{},{}",
            self.lon - self.margin,
            self.lat - self.margin,
            self.lon + self.margin,
            self.lat + self.margin
        )
    }
}

/// Why a layer contributed nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The point is outside the layer's extent; no request was sent.
    OutsideExtent,
    /// The request failed or the response could not be parsed.
    Failed(String),
    TimedOut,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::OutsideExtent => write!(f, "outside layer extent"),
            SkipReason::Failed(msg) => write!(f, "failed: {}", msg),
            SkipReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Result of querying one layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOutcome {
    Found(Vec<FeatureProperties>),
    Skipped(SkipReason),
}

/// A map service that can be queried layer by layer.
#[async_trait]
pub trait LayerSource: Send + Sync {
    /// Names of the layers to query.
    fn layers(&self) -> Vec<String>;

    /// Query one layer at `coords`.
    ///
    /// Transport failures may be returned as `Err`; the caller records them
    /// as [`SkipReason::Failed`].
    async fn lookup(&self, layer: &str, coords: &Coordinates) -> Result<LayerOutcome>;
}

/// Everything gathered for one location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyCollection {
    /// Layers that returned features (possibly none).
    pub properties: LayerProperties,
    /// Layers that were skipped, with the reason.
    pub skipped: Vec<(String, SkipReason)>,
}

/// Query every layer of `source` with at most `concurrency` lookups in flight.
pub async fn collect_properties(
    source: &dyn LayerSource,
    coords: &Coordinates,
    concurrency: usize,
    timeout: Duration,
) -> PropertyCollection {
    let layers = source.layers();
    debug!(layers = layers.len(), concurrency, "Collecting zoning properties");

    let outcomes: Vec<(String, LayerOutcome)> = stream::iter(layers)
        .map(|layer| async move {
            let outcome = match tokio::time::timeout(timeout, source.lookup(&layer, coords)).await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => LayerOutcome::Skipped(SkipReason::Failed(e.to_string())),
                Err(_) => LayerOutcome::Skipped(SkipReason::TimedOut),
            };
            (layer, outcome)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut collection = PropertyCollection::default();
    for (layer, outcome) in outcomes {
        match outcome {
            LayerOutcome::Found(features) => {
                collection.properties.insert(layer, features);
            }
            LayerOutcome::Skipped(SkipReason::OutsideExtent) => {
                debug!(layer = %layer, "Layer outside extent");
                collection.skipped.push((layer, SkipReason::OutsideExtent));
            }
            LayerOutcome::Skipped(reason) => {
                warn!(layer = %layer, reason = %reason, "Layer lookup skipped");
                collection.skipped.push((layer, reason));
            }
        }
    }
    collection.skipped.sort_by(|a, b| a.0.cmp(&b.0));

    collection
}
