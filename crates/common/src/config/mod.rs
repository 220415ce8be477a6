//! Configuration management for MSA Board services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend URL variable still set by existing dashboard deployments
pub const LEGACY_BACKEND_URL_VAR: &str = "NEXT_PUBLIC_API_BASE_URL";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Document backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Query cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Bucketing configuration
    #[serde(default)]
    pub buckets: BucketConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Where documents come from
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Forward to the document backend over HTTP
    Http,
    /// Keep documents in process (local runs and tests)
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_mode")]
    pub mode: BackendMode,

    /// Backend base URL, e.g. https://docs.example.com
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for idempotent reads
    #[serde(default = "default_backend_retries")]
    pub max_retries: u32,

    /// JSON file with documents to preload in memory mode
    pub seed_file: Option<String>,
}

/// Query cache backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
    None,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Off by default. While a cached view lives, documents the backend
    /// adds or changes on its own stay invisible until the TTL runs out.
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,

    /// Redis URL (only read for the redis backend)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// TTL for cached bucket responses in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Maximum entries kept by the memory backend
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Key prefix for namespacing
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BucketConfig {
    /// Agreements expiring within this many days are flagged
    #[serde(default = "default_expiry_threshold")]
    pub expiry_threshold_days: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_backend_mode() -> BackendMode { BackendMode::Http }
fn default_backend_timeout() -> u64 { 30 }
fn default_backend_retries() -> u32 { 3 }
fn default_cache_backend() -> CacheBackend { CacheBackend::None }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_cache_ttl() -> u64 { 30 }
fn default_cache_max_entries() -> usize { 256 }
fn default_key_prefix() -> String { "msaboard".to_string() }
fn default_expiry_threshold() -> i64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "msaboard".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__BACKEND__BASE_URL=http://localhost:8000
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_legacy_env(std::env::var(LEGACY_BACKEND_URL_VAR).ok());
        Ok(config)
    }

    /// Fill the backend URL from the dashboard-era variable when unset
    pub fn apply_legacy_env(&mut self, legacy_url: Option<String>) {
        if self.backend.base_url.is_none() {
            self.backend.base_url = legacy_url.filter(|url| !url.trim().is_empty());
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the backend timeout as Duration
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// Get the bucket cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: default_backend_mode(),
            base_url: None,
            timeout_secs: default_backend_timeout(),
            max_retries: default_backend_retries(),
            seed_file: None,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            expiry_threshold_days: default_expiry_threshold(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.backend.mode, BackendMode::Http);
        assert_eq!(config.buckets.expiry_threshold_days, 30);
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_cache_is_opt_in() {
        let config = AppConfig::default();
        assert_eq!(config.cache.backend, CacheBackend::None);

        let config: AppConfig =
            serde_json::from_str(r#"{"cache": {"backend": "memory", "ttl_secs": 5}}"#).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_legacy_backend_url() {
        let mut config = AppConfig::default();
        config.apply_legacy_env(Some("http://legacy:8000".to_string()));
        assert_eq!(config.backend.base_url.as_deref(), Some("http://legacy:8000"));

        // An explicit setting wins over the legacy variable
        config.apply_legacy_env(Some("http://other:9000".to_string()));
        assert_eq!(config.backend.base_url.as_deref(), Some("http://legacy:8000"));
    }

    #[test]
    fn test_blank_legacy_url_ignored() {
        let mut config = AppConfig::default();
        config.apply_legacy_env(Some("   ".to_string()));
        assert!(config.backend.base_url.is_none());
    }

    #[test]
    fn test_sections_default_when_missing() {
        let config: AppConfig = serde_json::from_str(r#"{"cache": {"backend": "none"}}"#).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::None);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.rate_limit.burst, 100);
    }
}
