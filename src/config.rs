//! Process configuration
//!
//! Settings are layered: `config/default.toml`, then an optional local file,
//! then `LIVEOPS_` environment variables (`LIVEOPS_SERVER__PORT=9000`).
//! Catalogs (intents, entity types, selection rules) are loaded separately
//! by the `catalog` module; this file only covers runtime settings.

use crate::error::{InsightError, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub sample_data: SampleDataConfig,
}

impl Config {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Load from a specific base file (tests use this)
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("LIVEOPS").separator("__"))
            .build()
            .map_err(|e| InsightError::Configuration(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| InsightError::Configuration(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            catalog: CatalogConfig::default(),
            providers: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            sample_data: SampleDataConfig::default(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_max_body() -> usize {
    65536
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
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

/// Catalog file location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_dir")]
    pub dir: String,
}

fn default_catalog_dir() -> String {
    "config/catalog".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dir: default_catalog_dir(),
        }
    }
}

/// External provider call settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Per-call timeout; a slower provider is treated as yielding no items
    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,
}

fn default_provider_timeout() -> u64 {
    2000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_provider_timeout(),
        }
    }
}

/// Generation (LLM) client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_gen_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}

fn default_gen_max_tokens() -> u32 {
    800
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_api_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_gen_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Demo/sample data seeding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDataConfig {
    #[serde(default = "default_sample_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sample_changes")]
    pub changes: usize,
    #[serde(default = "default_sample_seed")]
    pub seed: u64,
}

fn default_sample_enabled() -> bool {
    true
}

fn default_sample_changes() -> usize {
    50
}

fn default_sample_seed() -> u64 {
    7
}

impl Default for SampleDataConfig {
    fn default() -> Self {
        Self {
            enabled: default_sample_enabled(),
            changes: default_sample_changes(),
            seed: default_sample_seed(),
        }
    }
}
