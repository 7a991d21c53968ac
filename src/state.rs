use serde_json::Value;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::error_tracker::ErrorTracker;
use crate::health::HealthChecker;
use crate::key_generator::ClientId;
use crate::payment::{PaymentGateway, UnconfiguredGateway};
use crate::rate_limit_config::LimiterKind;
use crate::rate_limiter::{RateLimitDecision, RateLimiters};

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Process-scoped services, built once by the composition root.
pub struct AppState {
    pub config: Config,
    pub rate_limiters: Arc<RateLimiters>,
    pub cache: TtlCache<Value>,
    pub error_tracker: Arc<ErrorTracker>,
    pub catalog: Catalog,
    pub payments: Arc<dyn PaymentGateway>,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rate_limiters: Arc::new(RateLimiters::from_config(&config)),
            cache: TtlCache::new(config.cache_max_size, config.cache_ttl()),
            error_tracker: Arc::new(ErrorTracker::default()),
            catalog: Catalog::new(),
            payments: Arc::new(UnconfiguredGateway),
            health: HealthChecker::new(),
            config,
        }
    }

    pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = gateway;
        self
    }

    /// Count the request against `kind`, failing with a 429 once exhausted.
    pub fn rate_limit(&self, kind: LimiterKind, client: &ClientId) -> Result<RateLimitDecision> {
        let decision = self.rate_limiters.get(kind).check(client.as_str());
        if decision.allowed {
            Ok(decision)
        } else {
            tracing::warn!(
                limiter = %kind,
                client = %client.as_str(),
                reset_time = decision.reset_time,
                "Rate limit exceeded"
            );
            Err(AppError::RateLimited(decision))
        }
    }
}
