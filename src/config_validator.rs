use validator::ValidateUrl;

use crate::config::{Config, ConfigError};
use crate::rate_limit_config::LimiterKind;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
        Self::validate_environment(&config.app_env)?;
        Self::validate_public_url(&config.public_app_url)?;
        Self::validate_cache(config.cache_max_size, config.cache_ttl_secs)?;

        if config.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "Cleanup interval must be greater than 0".to_string(),
            ));
        }

        for kind in LimiterKind::ALL {
            config
                .rate_limit_policy(kind)
                .validate()
                .map_err(|msg| ConfigError::Invalid(format!("{} rate limit: {}", kind, msg)))?;
        }

        Ok(())
    }

    /// Validates environment name
    pub fn validate_environment(env: &str) -> Result<(), ConfigError> {
        let valid_envs = ["development", "production", "test"];
        if !valid_envs.contains(&env.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid environment '{}'. Must be one of: {:?}",
                env, valid_envs
            )));
        }

        Ok(())
    }

    /// Validates the public base URL
    pub fn validate_public_url(url: &str) -> Result<(), ConfigError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "Public app URL must start with 'http://' or 'https://'".to_string(),
            ));
        }

        if !url.validate_url() {
            return Err(ConfigError::Invalid(format!("Public app URL '{}' is not a valid URL", url)));
        }

        Ok(())
    }

    /// Validates cache sizing
    pub fn validate_cache(max_size: usize, ttl_secs: u64) -> Result<(), ConfigError> {
        if max_size == 0 {
            return Err(ConfigError::Invalid(
                "Cache max size must be greater than 0".to_string(),
            ));
        }

        if ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "Cache TTL must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_environment() {
        assert!(ConfigValidator::validate_environment("development").is_ok());
        assert!(ConfigValidator::validate_environment("Production").is_ok());
        assert!(ConfigValidator::validate_environment("test").is_ok());
    }

    #[test]
    fn test_invalid_environment() {
        assert!(ConfigValidator::validate_environment("invalid").is_err());
    }

    #[test]
    fn test_public_url() {
        assert!(ConfigValidator::validate_public_url("https://shop.example.com").is_ok());
        assert!(ConfigValidator::validate_public_url("http://localhost:3000").is_ok());
        assert!(ConfigValidator::validate_public_url("ftp://example.com").is_err());
        assert!(ConfigValidator::validate_public_url("shop.example.com").is_err());
    }

    #[test]
    fn test_cache_bounds() {
        assert!(ConfigValidator::validate_cache(100, 300).is_ok());
        assert!(ConfigValidator::validate_cache(0, 300).is_err());
        assert!(ConfigValidator::validate_cache(100, 0).is_err());
    }
}
