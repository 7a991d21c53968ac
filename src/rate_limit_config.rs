use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Endpoint groups that each own an independent rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterKind {
    /// General API mutations
    Api,
    /// Account-level operations
    Auth,
    /// Product create/update/delete
    Products,
    /// Image-bearing uploads (billboards)
    Uploads,
}

impl LimiterKind {
    pub const ALL: [LimiterKind; 4] = [
        LimiterKind::Api,
        LimiterKind::Auth,
        LimiterKind::Products,
        LimiterKind::Uploads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterKind::Api => "api",
            LimiterKind::Auth => "auth",
            LimiterKind::Products => "products",
            LimiterKind::Uploads => "uploads",
        }
    }

    /// Built-in policy for this group.
    pub fn default_policy(&self) -> RateLimitPolicy {
        match self {
            LimiterKind::Api => RateLimitPolicy::new(100, Duration::from_secs(15 * 60)),
            LimiterKind::Auth => RateLimitPolicy::new(5, Duration::from_secs(15 * 60)),
            LimiterKind::Products => RateLimitPolicy::new(30, Duration::from_secs(60)),
            LimiterKind::Uploads => RateLimitPolicy::new(10, Duration::from_secs(60)),
        }
    }
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-window policy: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    /// Validate policy parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.max_requests == 0 {
            return Err("Max requests must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("Window must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        assert_eq!(
            LimiterKind::Products.default_policy(),
            RateLimitPolicy::new(30, Duration::from_secs(60))
        );
        assert_eq!(LimiterKind::Auth.default_policy().max_requests, 5);
        for kind in LimiterKind::ALL {
            assert!(kind.default_policy().validate().is_ok());
        }
    }

    #[test]
    fn test_invalid_policy() {
        assert!(RateLimitPolicy::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(RateLimitPolicy::new(1, Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_policy_serializes_humantime_window() {
        let json = serde_json::to_value(LimiterKind::Api.default_policy()).unwrap();
        assert_eq!(json["maxRequests"], 100);
        assert_eq!(json["window"], "15m");
    }
}
