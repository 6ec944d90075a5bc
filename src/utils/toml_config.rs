//! TOML-based configuration for zoneqa
//!
//! This module provides declarative configuration for providers, the embedding
//! and generation models, corpus artifacts, segmentation, retrieval and the
//! zoning map service via a TOML file (`zoneqa.toml`).
//!
//! Configuration is loaded once at startup and passed explicitly to every
//! component. Secrets never live in the file: providers name the environment
//! variable that holds them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from zoneqa.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneqaConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    pub embedding: EmbeddingConfig,

    pub generation: GenerationConfig,

    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub map_service: MapServiceConfig,
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Mistral La Plateforme, or any OpenAI-compatible endpoint
    Mistral {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_mistral_base")]
        api_base: String,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
}

fn default_mistral_base() -> String {
    "https://api.mistral.ai/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension; must match the persisted index
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Texts sent per embedding request during `build`
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "mistral-embed".to_string()
}

fn default_dimensions() -> usize {
    1024
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============= Generation Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Bound on the whole completion, or on each fragment when streaming
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Replaces the built-in system persona
    pub persona: Option<String>,
}

fn default_generation_model() -> String {
    "mistral-large-latest".to_string()
}

fn default_generation_timeout() -> u64 {
    120
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============= Corpus Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_chunks_path")]
    pub chunks_path: PathBuf,

    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Regulation document used by `build` when no input is given
    pub source_path: Option<PathBuf>,
}

fn default_chunks_path() -> PathBuf {
    PathBuf::from("data/chunks.txt")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/embeddings.index")
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            chunks_path: default_chunks_path(),
            index_path: default_index_path(),
            source_path: None,
        }
    }
}

// ============= Segmenter Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Text before the first occurrence is preamble and is discarded
    #[serde(default = "default_start_marker")]
    pub start_marker: String,

    /// Matches the heading that opens a legal unit
    #[serde(default = "default_unit_pattern")]
    pub unit_pattern: String,

    /// Matches any structural heading that closes the current unit
    #[serde(default = "default_boundary_pattern")]
    pub boundary_pattern: String,

    /// Running headers and footers removed from every unit
    #[serde(default = "default_noise_pattern")]
    pub noise_pattern: String,
}

fn default_start_marker() -> String {
    "TÍTULO I".to_string()
}

fn default_unit_pattern() -> String {
    r"(?m)^[ \t]*Artigo[ \t]+\d+\.?º?".to_string()
}

fn default_boundary_pattern() -> String {
    r"(?m)^[ \t]*(TÍTULO|CAPÍTULO|SECÇÃO|SUBSECÇÃO|Artigo|ANEXO)\b".to_string()
}

fn default_noise_pattern() -> String {
    r"(?m)^[ \t]*(Diário da República,.*|N\.º \d+.*\d{4}|Pág\. \d+)[ \t]*$".to_string()
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            start_marker: default_start_marker(),
            unit_pattern: default_unit_pattern(),
            boundary_pattern: default_boundary_pattern(),
            noise_pattern: default_noise_pattern(),
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Only zoning features whose `abstract` equals this label are used
    #[serde(default = "default_plan_revision")]
    pub plan_revision: String,

    /// Character budget for retrieved text inside a prompt
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Feature fields never rendered into the classification
    #[serde(default = "default_excluded_fields")]
    pub excluded_fields: Vec<String>,
}

fn default_top_k() -> usize {
    2
}

fn default_plan_revision() -> String {
    "PDM 2021".to_string()
}

fn default_max_context_chars() -> usize {
    12_000
}

fn default_excluded_fields() -> Vec<String> {
    ["abstract", "nome", "id", "fid", "gid", "objectid"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            plan_revision: default_plan_revision(),
            max_context_chars: default_max_context_chars(),
            excluded_fields: default_excluded_fields(),
        }
    }
}

// ============= Map Service Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapServiceConfig {
    #[serde(default = "default_wms_url")]
    pub wms_url: String,

    #[serde(default = "default_wms_version")]
    pub wms_version: String,

    #[serde(default = "default_image_width")]
    pub image_width: u32,

    #[serde(default = "default_image_height")]
    pub image_height: u32,

    #[serde(default = "default_info_format")]
    pub info_format: String,

    /// Half-width of the lookup box, in degrees
    #[serde(default = "default_margin")]
    pub default_margin: f64,

    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    #[serde(default = "default_map_timeout")]
    pub timeout_secs: u64,

    /// Layers queried for every location
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

fn default_wms_url() -> String {
    "https://geopdm.cm-porto.pt/services/pdm/wms".to_string()
}

fn default_wms_version() -> String {
    "1.1.1".to_string()
}

fn default_image_width() -> u32 {
    800
}

fn default_image_height() -> u32 {
    600
}

fn default_info_format() -> String {
    "application/json".to_string()
}

fn default_margin() -> f64 {
    0.001
}

fn default_max_concurrent_lookups() -> usize {
    4
}

fn default_map_timeout() -> u64 {
    15
}

impl MapServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MapServiceConfig {
    fn default() -> Self {
        Self {
            wms_url: default_wms_url(),
            wms_version: default_wms_version(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            info_format: default_info_format(),
            default_margin: default_margin(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            timeout_secs: default_map_timeout(),
            layers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// WMS layer name used in requests
    pub name: String,

    /// Human-readable title, injected as the `nome` field
    pub title: String,

    /// Plan revision label, injected as the `abstract` field
    #[serde(default)]
    pub r#abstract: String,

    /// WGS84 extent `[min_lon, min_lat, max_lon, max_lat]`
    pub bbox: Option<[f64; 4]>,
}

impl LayerConfig {
    /// Whether the point lies inside the layer's extent. Layers without a
    /// declared extent are always queried.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        match self.bbox {
            Some([min_lon, min_lat, max_lon, max_lat]) => {
                (min_lon..=max_lon).contains(&lon) && (min_lat..=max_lat).contains(&lat)
            }
            None => true,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by [{1}] does not exist")]
    MissingProvider(String, String),

    #[error("Invalid pattern '{0}': {1}")]
    InvalidPattern(String, regex::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl ZoneqaConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: ZoneqaConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Provider env vars
        for provider in self.providers.values() {
            if let ProviderConfig::Mistral { api_key_env, .. } = provider {
                self.validate_env_var(api_key_env)?;
            }
        }

        // Provider references
        if !self.providers.contains_key(&self.embedding.provider) {
            return Err(ConfigError::MissingProvider(
                self.embedding.provider.clone(),
                "embedding".to_string(),
            ));
        }
        if !self.providers.contains_key(&self.generation.provider) {
            return Err(ConfigError::MissingProvider(
                self.generation.provider.clone(),
                "generation".to_string(),
            ));
        }

        // Numeric bounds
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be > 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be > 0".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".to_string(),
            ));
        }
        if self.map_service.max_concurrent_lookups == 0 {
            return Err(ConfigError::ValidationError(
                "map_service.max_concurrent_lookups must be > 0".to_string(),
            ));
        }
        if !(self.map_service.default_margin > 0.0) {
            return Err(ConfigError::ValidationError(
                "map_service.default_margin must be > 0".to_string(),
            ));
        }
        for (name, secs) in [
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("generation.timeout_secs", self.generation.timeout_secs),
            ("map_service.timeout_secs", self.map_service.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!("{} must be > 0", name)));
            }
        }

        // Segmentation patterns
        if self.segmenter.start_marker.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "segmenter.start_marker must not be empty".to_string(),
            ));
        }
        for pattern in [
            &self.segmenter.unit_pattern,
            &self.segmenter.boundary_pattern,
            &self.segmenter.noise_pattern,
        ] {
            Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern(pattern.clone(), e))?;
        }

        // Layer extents
        for layer in &self.map_service.layers {
            if let Some([min_lon, min_lat, max_lon, max_lat]) = layer.bbox {
                if min_lon > max_lon || min_lat > max_lat {
                    return Err(ConfigError::ValidationError(format!(
                        "Layer '{}' has an inverted bbox",
                        layer.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Provider backing the embedder
    pub fn embedding_provider(&self) -> Result<&ProviderConfig, ConfigError> {
        self.get_provider(&self.embedding.provider).ok_or_else(|| {
            ConfigError::MissingProvider(self.embedding.provider.clone(), "embedding".to_string())
        })
    }

    /// Provider backing the generator
    pub fn generation_provider(&self) -> Result<&ProviderConfig, ConfigError> {
        self.get_provider(&self.generation.provider).ok_or_else(|| {
            ConfigError::MissingProvider(
                self.generation.provider.clone(),
                "generation".to_string(),
            )
        })
    }
}
