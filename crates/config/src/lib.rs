//! Configuration loading, validation, and management for toolrelay.
//!
//! Loads configuration from `~/.toolrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use toolrelay_core::ToolCallMode;

/// The root configuration structure.
///
/// Maps directly to `~/.toolrelay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider used when a request does not name one
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used when neither the request nor the provider names one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Ceiling on backend calls per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Per-tool execution timeout
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Search tool settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Web scraping tool settings
    #[serde(default)]
    pub scraping: ScrapingConfig,
}

fn default_provider() -> String {
    "deepinfra".into()
}
fn default_model() -> String {
    "meta-llama/Llama-3.3-70B-Instruct-Turbo".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_iterations() -> u32 {
    10
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// "native" (function calling) or "prompted" (JSON in the reply text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_mode: Option<ToolCallMode>,

    /// HTTP timeout for completion requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("tool_call_mode", &self.tool_call_mode)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_region")]
    pub region: String,

    #[serde(default = "default_search_results")]
    pub default_results: u32,

    #[serde(default = "default_max_search_results")]
    pub max_results: u32,
}

fn default_search_region() -> String {
    "wt-wt".into()
}
fn default_search_results() -> u32 {
    5
}
fn default_max_search_results() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            region: default_search_region(),
            default_results: default_search_results(),
            max_results: default_max_search_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_scraping_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_scraping_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    concat!("toolrelay/", env!("CARGO_PKG_VERSION")).into()
}
fn default_max_content_chars() -> usize {
    5000
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_scraping_timeout(),
            user_agent: default_user_agent(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolrelay/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_path(None)
    }

    /// Load from an explicit path (or the default one), then apply
    /// environment overrides:
    /// - `DEEPINFRA_API_KEY`, `OPENAI_API_KEY`
    /// - `OLLAMA_BASE_URL`
    /// - `TOOLRELAY_PROVIDER`, `TOOLRELAY_MODEL`, `TOOLRELAY_LOG_LEVEL`
    pub fn load_with_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`. Environment values win
    /// over file values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("DEEPINFRA_API_KEY") {
            self.provider_entry("deepinfra").api_key = Some(key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.provider_entry("openai").api_key = Some(key);
        }
        if let Some(url) = non_empty("OLLAMA_BASE_URL") {
            self.provider_entry("ollama").api_url = Some(url);
        }
        if let Some(provider) = non_empty("TOOLRELAY_PROVIDER") {
            self.default_provider = provider.to_lowercase();
        }
        if let Some(model) = non_empty("TOOLRELAY_MODEL") {
            self.default_model = model;
        }
        if let Some(level) = non_empty("TOOLRELAY_LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
    }

    fn provider_entry(&mut self, name: &str) -> &mut ProviderConfig {
        self.providers.entry(name.to_string()).or_default()
    }

    /// Settings for one provider (empty settings if none are configured).
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    /// The model to use for `provider` when a request names none.
    pub fn model_for(&self, provider: &str) -> String {
        self.providers
            .get(provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1".into(),
            ));
        }

        if self.search.default_results > self.search.max_results {
            return Err(ConfigError::ValidationError(
                "search.default_results must not exceed search.max_results".into(),
            ));
        }

        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "log_format must be \"pretty\" or \"json\", got \"{}\"",
                self.log_format
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
            search: SearchConfig::default(),
            scraping: ScrapingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
