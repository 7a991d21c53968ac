//! Fixed-window rate limiting.
//!
//! Each [`RateLimiter`] counts requests per client identifier inside discrete,
//! non-overlapping windows. A client may burst up to twice the limit across a
//! window boundary; that is how fixed windows behave.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::Config;
use crate::rate_limit_config::{LimiterKind, RateLimitPolicy};
use crate::utils::now_millis;

/// Counter state for one client inside the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: u64,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window ends.
    pub reset_time: u64,
}

#[derive(Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    entries: Arc<DashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Count a request from `identifier` against the current window.
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_at(identifier, now_millis())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    ///
    /// The read-modify-write happens under the entry's shard lock, so
    /// concurrent requests for one key never lose an increment.
    pub fn check_at(&self, identifier: &str, now: u64) -> RateLimitDecision {
        let max = self.policy.max_requests;
        let fresh = RateLimitEntry {
            count: 1,
            reset_time: now + self.policy.window_ms(),
        };

        let (allowed, state) = match self.entries.entry(identifier.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                (true, fresh)
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if now > entry.reset_time {
                    *entry = fresh;
                    (true, *entry)
                } else if entry.count >= max {
                    (false, *entry)
                } else {
                    entry.count += 1;
                    (true, *entry)
                }
            }
        };

        RateLimitDecision {
            allowed,
            limit: max,
            remaining: max.saturating_sub(state.count),
            reset_time: state.reset_time,
        }
    }

    /// Current window state for `identifier`, if any.
    pub fn entry(&self, identifier: &str) -> Option<RateLimitEntry> {
        self.entries.get(identifier).map(|entry| *entry)
    }

    /// Drop every entry whose window has ended. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(now_millis())
    }

    pub fn cleanup_at(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now <= entry.reset_time);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-limiter snapshot reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterStats {
    pub name: LimiterKind,
    pub active: bool,
    pub policy: RateLimitPolicy,
    pub tracked_clients: usize,
}

/// One independent limiter per endpoint group.
pub struct RateLimiters {
    api: RateLimiter,
    auth: RateLimiter,
    products: RateLimiter,
    uploads: RateLimiter,
}

impl RateLimiters {
    pub fn new(policy_for: impl Fn(LimiterKind) -> RateLimitPolicy) -> Self {
        Self {
            api: RateLimiter::new(policy_for(LimiterKind::Api)),
            auth: RateLimiter::new(policy_for(LimiterKind::Auth)),
            products: RateLimiter::new(policy_for(LimiterKind::Products)),
            uploads: RateLimiter::new(policy_for(LimiterKind::Uploads)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(|kind| config.rate_limit_policy(kind))
    }

    pub fn get(&self, kind: LimiterKind) -> &RateLimiter {
        match kind {
            LimiterKind::Api => &self.api,
            LimiterKind::Auth => &self.auth,
            LimiterKind::Products => &self.products,
            LimiterKind::Uploads => &self.uploads,
        }
    }

    pub fn cleanup(&self) -> usize {
        LimiterKind::ALL
            .iter()
            .map(|kind| self.get(*kind).cleanup())
            .sum()
    }

    pub fn stats(&self) -> Vec<LimiterStats> {
        LimiterKind::ALL
            .iter()
            .map(|kind| {
                let limiter = self.get(*kind);
                LimiterStats {
                    name: *kind,
                    active: true,
                    policy: limiter.policy(),
                    tracked_clients: limiter.len(),
                }
            })
            .collect()
    }

    /// Sweep expired entries on a fixed interval until the task is aborted.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiters = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiters.cleanup();
                if removed > 0 {
                    debug!(removed, "Removed expired rate limit entries");
                }
            }
        })
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new(|kind| kind.default_policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitPolicy::new(max, Duration::from_millis(window_ms)))
    }

    #[test]
    fn test_denies_request_after_limit() {
        let limiter = limiter(3, 1_000);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("client-a", 100);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.reset_time, 1_100);
        }

        let denied = limiter.check_at("client-a", 200);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_time, 1_100);
        assert_eq!(limiter.entry("client-a").unwrap().count, 3);
    }

    #[test]
    fn test_window_resets_after_reset_time() {
        let limiter = limiter(1, 1_000);
        assert!(limiter.check_at("c", 0).allowed);
        assert!(!limiter.check_at("c", 1_000).allowed);

        let decision = limiter.check_at("c", 1_001);
        assert!(decision.allowed);
        assert_eq!(decision.reset_time, 2_001);
        assert_eq!(limiter.entry("c").unwrap().count, 1);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1, 1_000);
        assert!(limiter.check_at("a", 0).allowed);
        assert!(!limiter.check_at("a", 1).allowed);
        assert!(limiter.check_at("b", 1).allowed);
    }

    #[test]
    fn test_boundary_burst_is_permitted() {
        let limiter = limiter(2, 1_000);
        assert!(limiter.check_at("c", 999).allowed);
        assert!(limiter.check_at("c", 1_000).allowed);
        // Window ends at 1_999; a fresh window admits two more immediately.
        assert!(limiter.check_at("c", 2_000).allowed);
        assert!(limiter.check_at("c", 2_001).allowed);
        assert!(!limiter.check_at("c", 2_002).allowed);
    }

    #[test]
    fn test_cleanup_removes_expired_entries() {
        let limiter = limiter(5, 1_000);
        limiter.check_at("old", 0);
        limiter.check_at("new", 900);

        assert_eq!(limiter.cleanup_at(1_500), 1);
        assert!(limiter.entry("old").is_none());
        assert!(limiter.entry("new").is_some());
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_limiter_groups_do_not_share_state() {
        let limiters = RateLimiters::new(|_| RateLimitPolicy::new(1, Duration::from_secs(60)));
        assert!(limiters.get(LimiterKind::Products).check("client").allowed);
        assert!(!limiters.get(LimiterKind::Products).check("client").allowed);
        assert!(limiters.get(LimiterKind::Api).check("client").allowed);

        let stats = limiters.stats();
        assert_eq!(stats.len(), 4);
        assert_eq!(
            stats.iter().find(|s| s.name == LimiterKind::Products).unwrap().tracked_clients,
            1
        );
    }

    #[test]
    fn test_concurrent_checks_respect_limit() {
        let limiter = limiter(50, 60_000);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20).filter(|_| limiter.check_at("shared", 0).allowed).count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps_on_interval() {
        let limiters = Arc::new(RateLimiters::new(|_| {
            RateLimitPolicy::new(5, Duration::from_secs(60))
        }));
        // Window closed long ago.
        limiters.get(LimiterKind::Api).check_at("stale", 0);
        limiters.get(LimiterKind::Uploads).check("live");

        let task = limiters.spawn_cleanup(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(limiters.get(LimiterKind::Api).len(), 1);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(limiters.get(LimiterKind::Api).len(), 0);
        assert_eq!(limiters.get(LimiterKind::Uploads).len(), 1);

        task.abort();
    }
}
