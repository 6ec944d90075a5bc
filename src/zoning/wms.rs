//! WMS `GetFeatureInfo` client.
//!
//! Each configured layer is queried with a small box around the point and the
//! pixel at the centre of the rendered image, asking for a GeoJSON-style
//! feature collection. The layer title and plan revision are injected into
//! every feature as `nome` and `abstract`.

use super::{Coordinates, FeatureProperties, LayerOutcome, LayerSource, SkipReason};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{LayerConfig, MapServiceConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub struct WmsClient {
    client: Client,
    config: MapServiceConfig,
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<FeatureProperties>,
}

impl WmsClient {
    pub fn new(config: MapServiceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.config.layers.iter().find(|l| l.name == name)
    }

    /// Query parameters for one `GetFeatureInfo` request.
    pub fn feature_info_params(
        &self,
        layer: &str,
        coords: &Coordinates,
    ) -> Vec<(&'static str, String)> {
        let width = self.config.image_width;
        let height = self.config.image_height;

        // 1.3.0 renames the pixel and CRS parameters and uses lat/lon axis
        // order for EPSG:4326.
        let (crs_key, x_key, y_key, bbox) = if self.config.wms_version.starts_with("1.3") {
            let bbox = format!(
                "{},{},{},{}",
                coords.lat - coords.margin,
                coords.lon - coords.margin,
                coords.lat + coords.margin,
                coords.lon + coords.margin
            );
            ("crs", "i", "j", bbox)
        } else {
            ("srs", "x", "y", coords.bbox())
        };

        vec![
            ("service", "WMS".to_string()),
            ("version", self.config.wms_version.clone()),
            ("request", "GetFeatureInfo".to_string()),
            ("layers", layer.to_string()),
            ("query_layers", layer.to_string()),
            ("bbox", bbox),
            ("width", width.to_string()),
            ("height", height.to_string()),
            (crs_key, "EPSG:4326".to_string()),
            (x_key, (width / 2).to_string()),
            (y_key, (height / 2).to_string()),
            ("info_format", self.config.info_format.clone()),
        ]
    }
}

#[async_trait]
impl LayerSource for WmsClient {
    fn layers(&self) -> Vec<String> {
        self.config.layers.iter().map(|l| l.name.clone()).collect()
    }

    async fn lookup(&self, layer: &str, coords: &Coordinates) -> Result<LayerOutcome> {
        let layer_config = self
            .layer(layer)
            .ok_or_else(|| AppError::MapService(format!("Unknown layer '{}'", layer)))?;

        if !layer_config.contains(coords.lat, coords.lon) {
            return Ok(LayerOutcome::Skipped(SkipReason::OutsideExtent));
        }

        let response = self
            .client
            .get(&self.config.wms_url)
            .query(&self.feature_info_params(layer, coords))
            .send()
            .await
            .map_err(|e| AppError::MapService(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::MapService(format!("{}: {}", status, body)));
        }

        let collection: FeatureCollection = response
            .json()
            .await
            .map_err(|e| AppError::MapService(format!("Invalid feature info: {}", e)))?;

        let features: Vec<FeatureProperties> = collection
            .features
            .into_iter()
            .filter_map(|feature| feature.properties)
            .map(|mut properties| {
                properties.insert("nome".to_string(), Value::String(layer_config.title.clone()));
                properties.insert(
                    "abstract".to_string(),
                    Value::String(layer_config.r#abstract.clone()),
                );
                properties
            })
            .collect();

        debug!(layer = %layer, features = features.len(), "Feature info received");
        Ok(LayerOutcome::Found(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(version: &str) -> WmsClient {
        WmsClient::new(MapServiceConfig {
            wms_version: version.to_string(),
            ..MapServiceConfig::default()
        })
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_params_v111() {
        let coords = Coordinates::new(41.0, -8.5, 0.5);
        let params = client("1.1.1").feature_info_params("pdm:solo", &coords);

        assert_eq!(param(&params, "request"), Some("GetFeatureInfo"));
        assert_eq!(param(&params, "layers"), Some("pdm:solo"));
        assert_eq!(param(&params, "query_layers"), Some("pdm:solo"));
        assert_eq!(param(&params, "bbox"), Some("-9,40.5,-8,41.5"));
        assert_eq!(param(&params, "srs"), Some("EPSG:4326"));
        assert_eq!(param(&params, "x"), Some("400"));
        assert_eq!(param(&params, "y"), Some("300"));
        assert_eq!(param(&params, "info_format"), Some("application/json"));
    }

    #[test]
    fn test_params_v130_axis_order() {
        let coords = Coordinates::new(41.0, -8.5, 0.5);
        let params = client("1.3.0").feature_info_params("pdm:solo", &coords);

        assert_eq!(param(&params, "bbox"), Some("40.5,-9,41.5,-8"));
        assert_eq!(param(&params, "crs"), Some("EPSG:4326"));
        assert_eq!(param(&params, "i"), Some("400"));
        assert!(param(&params, "srs").is_none());
    }
}
