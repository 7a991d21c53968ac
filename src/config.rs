use envconfig::Envconfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config_validator::ConfigValidator;
use crate::rate_limit_config::{LimiterKind, RateLimitPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envconfig::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// development, production or test
    #[envconfig(from = "APP_ENV", default = "development")]
    pub app_env: String,

    /// Log level applied to this crate and tower-http, overriding the
    /// environment-based default
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Rate limiter cleanup interval in seconds
    #[envconfig(from = "CLEANUP_INTERVAL", default = "60")]
    pub cleanup_interval_secs: u64,

    #[envconfig(from = "CACHE_MAX_SIZE", default = "100")]
    pub cache_max_size: usize,

    /// Default cache TTL in seconds
    #[envconfig(from = "CACHE_TTL", default = "300")]
    pub cache_ttl_secs: u64,

    #[envconfig(from = "API_RATE_LIMIT", default = "100")]
    pub api_rate_limit: u32,

    #[envconfig(from = "API_RATE_WINDOW", default = "900")]
    pub api_rate_window_secs: u64,

    #[envconfig(from = "AUTH_RATE_LIMIT", default = "5")]
    pub auth_rate_limit: u32,

    #[envconfig(from = "AUTH_RATE_WINDOW", default = "900")]
    pub auth_rate_window_secs: u64,

    #[envconfig(from = "PRODUCTS_RATE_LIMIT", default = "30")]
    pub products_rate_limit: u32,

    #[envconfig(from = "PRODUCTS_RATE_WINDOW", default = "60")]
    pub products_rate_window_secs: u64,

    #[envconfig(from = "UPLOADS_RATE_LIMIT", default = "10")]
    pub uploads_rate_limit: u32,

    #[envconfig(from = "UPLOADS_RATE_WINDOW", default = "60")]
    pub uploads_rate_window_secs: u64,

    /// Public base URL used to build payment redirect links
    #[envconfig(from = "PUBLIC_APP_URL", default = "http://localhost:3000")]
    pub public_app_url: String,
}

impl Config {
    /// Load and validate configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::init_from_env()?;
        ConfigValidator::validate_config(&config)?;
        Ok(config)
    }

    /// Load and validate configuration from an explicit map; unset keys take
    /// their defaults.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = Config::init_from_hashmap(vars)?;
        ConfigValidator::validate_config(&config)?;
        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_policy(&self, kind: LimiterKind) -> RateLimitPolicy {
        let (max_requests, window_secs) = match kind {
            LimiterKind::Api => (self.api_rate_limit, self.api_rate_window_secs),
            LimiterKind::Auth => (self.auth_rate_limit, self.auth_rate_window_secs),
            LimiterKind::Products => (self.products_rate_limit, self.products_rate_window_secs),
            LimiterKind::Uploads => (self.uploads_rate_limit, self.uploads_rate_window_secs),
        };
        RateLimitPolicy::new(max_requests, Duration::from_secs(window_secs))
    }

    /// Default `EnvFilter` directive. Outside development only errors are
    /// emitted unless `LOG_LEVEL` says otherwise.
    pub fn log_filter(&self) -> String {
        let level = match &self.log_level {
            Some(level) => level.as_str(),
            None if self.is_development() => "debug",
            None => "error",
        };
        format!("storefront={},tower_http={}", level, level)
    }
}
