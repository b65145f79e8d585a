//! Configuration management for `tripdeck`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TripDeckError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripDeckConfig {
    /// Text-generation backend configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Travel-data provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Per-host rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Deck generation pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Provider response cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Text-generation backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// API key, if the backend needs one
    pub api_key: Option<String>,
    /// Model used for short cards
    #[serde(default = "default_llm_model")]
    pub default_model: String,
    /// Model used for long, structured cards (itinerary, budget)
    #[serde(default = "default_llm_detailed_model")]
    pub detailed_model: String,
    /// Hard timeout per generation call in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u32,
}

/// Travel-data provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Base URL of the travel-data gateway
    #[serde(default = "default_providers_base_url")]
    pub base_url: String,
    /// API key for the gateway
    pub api_key: Option<String>,
    /// Hard timeout per source fetch in seconds
    #[serde(default = "default_providers_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of transport retries per fetch
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Sliding-window rate limit settings, applied per host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per host within a 60 second window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// First backoff step in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Largest single backoff step in milliseconds
    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,
    /// Total time a caller may wait for capacity before giving up
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u32,
}

/// Deck pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Card tasks allowed to run at the same time
    #[serde(default = "default_max_concurrent_cards")]
    pub max_concurrent_cards: u32,
    /// Character budget for each source's raw JSON slice inside a prompt
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: u32,
    /// Array items kept per list when slicing source JSON for a prompt
    #[serde(default = "default_max_source_items")]
    pub max_source_items: u32,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether provider responses are cached on disk
    #[serde(default)]
    pub enabled: bool,
    /// Cache TTL in hours
    #[serde(default = "default_cache_ttl")]
    pub ttl_hours: u32,
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_detailed_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_timeout() -> u32 {
    45
}

fn default_max_retries() -> u32 {
    2
}

fn default_providers_base_url() -> String {
    "http://localhost:8787/travel".to_string()
}

fn default_providers_timeout() -> u32 {
    15
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_ceiling_ms() -> u64 {
    8_000
}

fn default_max_wait_seconds() -> u32 {
    20
}

fn default_max_concurrent_cards() -> u32 {
    6
}

fn default_max_source_chars() -> u32 {
    3_000
}

fn default_max_source_items() -> u32 {
    5
}

fn default_cache_ttl() -> u32 {
    6
}

fn default_cache_location() -> String {
    "~/.cache/tripdeck".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            default_model: default_llm_model(),
            detailed_model: default_llm_detailed_model(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            base_url: default_providers_base_url(),
            api_key: None,
            timeout_seconds: default_providers_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_cards: default_max_concurrent_cards(),
            max_source_chars: default_max_source_chars(),
            max_source_items: default_max_source_items(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_hours: default_cache_ttl(),
            location: default_cache_location(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TripDeckConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            providers: ProvidersConfig::default(),
            rate_limit: RateLimitConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl ProvidersConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_hours) * 3600)
    }

    /// Cache directory with a leading `~` expanded to the home directory
    #[must_use]
    pub fn resolved_location(&self) -> PathBuf {
        match self.location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map_or_else(|| PathBuf::from(&self.location), |home| home.join(rest)),
            None => PathBuf::from(&self.location),
        }
    }
}

impl TripDeckConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // TRIPDECK_LLM__API_KEY -> llm.api_key
        builder = builder.add_source(
            Environment::with_prefix("TRIPDECK")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TripDeckConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tripdeck").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.llm.base_url.is_empty() {
            self.llm.base_url = default_llm_base_url();
        }
        if self.llm.default_model.is_empty() {
            self.llm.default_model = default_llm_model();
        }
        if self.llm.detailed_model.is_empty() {
            self.llm.detailed_model = default_llm_detailed_model();
        }
        if self.llm.timeout_seconds == 0 {
            self.llm.timeout_seconds = default_llm_timeout();
        }
        if self.providers.base_url.is_empty() {
            self.providers.base_url = default_providers_base_url();
        }
        if self.providers.timeout_seconds == 0 {
            self.providers.timeout_seconds = default_providers_timeout();
        }
        if self.rate_limit.requests_per_minute == 0 {
            self.rate_limit.requests_per_minute = default_requests_per_minute();
        }
        if self.rate_limit.backoff_base_ms == 0 {
            self.rate_limit.backoff_base_ms = default_backoff_base_ms();
        }
        if self.rate_limit.backoff_ceiling_ms == 0 {
            self.rate_limit.backoff_ceiling_ms = default_backoff_ceiling_ms();
        }
        if self.pipeline.max_concurrent_cards == 0 {
            self.pipeline.max_concurrent_cards = default_max_concurrent_cards();
        }
        if self.pipeline.max_source_chars == 0 {
            self.pipeline.max_source_chars = default_max_source_chars();
        }
        if self.pipeline.max_source_items == 0 {
            self.pipeline.max_source_items = default_max_source_items();
        }
        if self.cache.ttl_hours == 0 {
            self.cache.ttl_hours = default_cache_ttl();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        for (name, key) in [
            ("LLM", &self.llm.api_key),
            ("Travel data", &self.providers.api_key),
        ] {
            if let Some(api_key) = key {
                if api_key.is_empty() {
                    return Err(TripDeckError::config(format!(
                        "{name} API key cannot be empty if provided. Either remove it or provide a valid key."
                    ))
                    .into());
                }

                if api_key.len() < 8 {
                    return Err(TripDeckError::config(format!(
                        "{name} API key appears to be invalid (too short). Please check your API key."
                    ))
                    .into());
                }
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.llm.timeout_seconds > 300 || self.providers.timeout_seconds > 300 {
            return Err(TripDeckError::config("Request timeout cannot exceed 300 seconds").into());
        }

        if self.providers.max_retries > 10 {
            return Err(TripDeckError::config("Max retries cannot exceed 10").into());
        }

        if self.rate_limit.backoff_base_ms > self.rate_limit.backoff_ceiling_ms {
            return Err(TripDeckError::config(
                "Rate limit backoff base cannot exceed the backoff ceiling",
            )
            .into());
        }

        if self.pipeline.max_concurrent_cards > 64 {
            return Err(TripDeckError::config("Concurrent card tasks cannot exceed 64").into());
        }

        if self.cache.ttl_hours > 168 {
            return Err(TripDeckError::config("Cache TTL cannot exceed 168 hours (1 week)").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TripDeckError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TripDeckError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("LLM", &self.llm.base_url),
            ("Travel data", &self.providers.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TripDeckError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TripDeckConfig::default();
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.llm.timeout_seconds, 45);
        assert_eq!(config.rate_limit.requests_per_minute, 60);
        assert_eq!(config.logging.level, "info");
        assert!(!config.cache.enabled);
        assert!(config.llm.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_location_and_ttl() {
        let mut cache = CacheConfig::default();
        assert_eq!(cache.ttl(), Duration::from_secs(6 * 3600));
        assert!(!cache.resolved_location().starts_with("~"));

        cache.location = "/tmp/tripdeck-cache".to_string();
        assert_eq!(cache.resolved_location(), PathBuf::from("/tmp/tripdeck-cache"));
    }

    #[test]
    fn test_config_validation_short_api_key() {
        let mut config = TripDeckConfig::default();
        config.llm.api_key = Some("short".to_string());
        let result = config.validate_api_keys();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("too short"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = TripDeckConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = TripDeckConfig::default();
        config.providers.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_backoff_order() {
        let mut config = TripDeckConfig::default();
        config.rate_limit.backoff_base_ms = 10_000;
        config.rate_limit.backoff_ceiling_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_defaults_fills_zeroes() {
        let mut config = TripDeckConfig::default();
        config.pipeline.max_concurrent_cards = 0;
        config.llm.default_model.clear();
        config.apply_defaults();
        assert_eq!(config.pipeline.max_concurrent_cards, 6);
        assert_eq!(config.llm.default_model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[pipeline]\nmax_concurrent_cards = 3\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = TripDeckConfig::load_from_path(Some(path)).unwrap();
        assert_eq!(config.pipeline.max_concurrent_cards, 3);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.pipeline.max_source_items, 5);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = TripDeckConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("tripdeck"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
