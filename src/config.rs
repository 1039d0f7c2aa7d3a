use crate::analysis::cache::{DEFAULT_CACHE_DIR, DEFAULT_GENERATION_TIMEOUT};
use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;

const DEFAULT_FEED_URL: &str = "https://data.priceofgoods.com";
const API_KEY_ENV: &str = "PERPLEXITY_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f64,
    /// e.g. `month`, `week`
    #[serde(default)]
    pub search_recency_filter: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl AnalysisConfig {
    /// Key from the config file, falling back to `PERPLEXITY_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            frequency_penalty: default_frequency_penalty(),
            search_recency_filter: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_feed_url")]
    pub feed_base_url: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Data keys to publish; empty means the whole catalog.
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub refresh_interval_seconds: Option<u64>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

fn default_output_dir() -> String {
    "dist/data".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_model() -> String {
    "sonar-pro".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_frequency_penalty() -> f64 {
    1.0
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_GENERATION_TIMEOUT.as_secs()
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
