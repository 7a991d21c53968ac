use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::cache::CacheStats;
use crate::error_tracker::ErrorStats;
use crate::rate_limiter::LimiterStats;
use crate::state::AppState;

/// Outcome of one dependency check. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub database: CheckStatus,
    pub cache: CheckStatus,
    pub rate_limiters: CheckStatus,
}

impl HealthChecks {
    /// Overall status is the worst individual check.
    pub fn overall(&self) -> CheckStatus {
        self.database.max(self.cache).max(self.rate_limiters)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: CheckStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub response_time_ms: u64,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stats: Option<CacheStats>,
    pub rate_limiters: Vec<LimiterStats>,
    pub errors: ErrorStats,
}

impl HealthReport {
    /// 503 only when the service cannot serve requests at all.
    pub fn status_code(&self) -> StatusCode {
        match self.status {
            CheckStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            CheckStatus::Healthy | CheckStatus::Degraded => StatusCode::OK,
        }
    }
}

pub struct HealthChecker {
    started: Instant,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub async fn check(&self, state: &AppState) -> HealthReport {
        let start = Instant::now();

        let database = match state.catalog.ping().await {
            Ok(()) => CheckStatus::Healthy,
            Err(e) => {
                tracing::error!(error = %e, "Database health check failed");
                CheckStatus::Unhealthy
            }
        };

        let (cache, cache_stats) = match state.cache.stats() {
            Ok(stats) => (CheckStatus::Healthy, Some(stats)),
            Err(e) => {
                tracing::error!(error = %e, "Cache health check failed");
                (CheckStatus::Degraded, None)
            }
        };

        let checks = HealthChecks {
            database,
            cache,
            rate_limiters: CheckStatus::Healthy,
        };

        HealthReport {
            status: checks.overall(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: state.config.app_env.clone(),
            uptime_seconds: self.started.elapsed().as_secs(),
            response_time_ms: start.elapsed().as_millis() as u64,
            checks,
            cache_stats,
            rate_limiters: state.rate_limiters.stats(),
            errors: state.error_tracker.stats(),
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
