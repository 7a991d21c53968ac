//! In-memory ring buffer of recent errors.
//!
//! Events land here from three places: 500 responses (via the tracking
//! middleware), panics caught inside request handlers, and panics anywhere
//! else in the process (via [`install_panic_hook`]).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::error::Error as StdError;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::error;

use crate::error::AppError;

pub const DEFAULT_CAPACITY: usize = 100;

/// Name, message and source chain of a captured error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedError {
    pub name: String,
    pub message: String,
    pub stack: Vec<String>,
}

impl TrackedError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Capture any error, naming it after its type.
    pub fn from_error<E: StdError + 'static>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self {
            name: name.to_string(),
            message: err.to_string(),
            stack: source_chain(err),
        }
    }

    pub fn from_app_error(err: &AppError) -> Self {
        Self {
            name: err.name().to_string(),
            message: err.to_string(),
            stack: source_chain(err),
        }
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Self::new("Panic", message)
    }
}

fn source_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}

/// Free-form tags attached to a captured error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_store(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub error: TrackedError,
    pub context: ErrorContext,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub url: String,
}

impl ErrorEvent {
    pub fn new(error: TrackedError, context: ErrorContext) -> Self {
        Self {
            error,
            context,
            timestamp: Utc::now(),
            user_agent: "server".to_string(),
            url: "server".to_string(),
        }
    }

    pub fn with_request(mut self, user_agent: Option<&str>, url: impl Into<String>) -> Self {
        if let Some(user_agent) = user_agent {
            self.user_agent = user_agent.to_string();
        }
        self.url = url.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    /// Events from the last 24 hours.
    pub recent: usize,
}

pub struct ErrorTracker {
    capacity: usize,
    events: Mutex<VecDeque<ErrorEvent>>,
}

impl ErrorTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    // A poisoned buffer still holds valid events.
    fn events(&self) -> MutexGuard<'_, VecDeque<ErrorEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn track(&self, error: TrackedError, context: ErrorContext) {
        self.record(ErrorEvent::new(error, context));
    }

    /// Log `event` at error level and append it, dropping the oldest when full.
    pub fn record(&self, event: ErrorEvent) {
        error!(
            error.name = %event.error.name,
            error.message = %event.error.message,
            error.stack = ?event.error.stack,
            user_id = event.context.user_id.as_deref(),
            store_id = event.context.store_id.as_deref(),
            action = event.context.action.as_deref(),
            url = %event.url,
            "Error tracked"
        );

        let mut events = self.events();
        events.push_back(event);
        while events.len() > self.capacity {
            events.pop_front();
        }
    }

    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.events().iter().cloned().collect()
    }

    pub fn stats(&self) -> ErrorStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> ErrorStats {
        let one_day_ago = now - ChronoDuration::hours(24);
        let events = self.events();

        let mut by_type = BTreeMap::new();
        let mut recent = 0;
        for event in events.iter() {
            *by_type.entry(event.error.name.clone()).or_insert(0) += 1;
            if event.timestamp > one_day_ago {
                recent += 1;
            }
        }

        ErrorStats {
            total: events.len(),
            by_type,
            recent,
        }
    }
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Record panics from any thread, then defer to the previously installed hook.
///
/// Panics raised while serving a request are skipped here; the request
/// pipeline catches and records those itself.
pub fn install_panic_hook(tracker: Arc<ErrorTracker>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if crate::middleware::in_request() {
            previous(info);
            return;
        }
        let mut context = ErrorContext::action("uncaught-panic");
        if let Some(location) = info.location() {
            context = context.with("location", location.to_string());
        }
        tracker.track(TrackedError::from_panic(info.payload()), context);
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct OuterError(#[source] std::io::Error);

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let tracker = ErrorTracker::new(3);
        for i in 0..5 {
            tracker.track(TrackedError::new("E", format!("error {}", i)), ErrorContext::default());
        }

        let messages: Vec<_> = tracker.errors().into_iter().map(|e| e.error.message).collect();
        assert_eq!(messages, vec!["error 2", "error 3", "error 4"]);
    }

    #[test]
    fn test_stats_group_by_name_and_window() {
        let tracker = ErrorTracker::new(10);
        let now = Utc::now();

        let mut old = ErrorEvent::new(TrackedError::new("NotFound", "gone"), ErrorContext::default());
        old.timestamp = now - ChronoDuration::hours(30);
        tracker.record(old);
        tracker.track(TrackedError::new("InternalError", "boom"), ErrorContext::default());
        tracker.track(TrackedError::new("InternalError", "bang"), ErrorContext::default());

        let stats = tracker.stats_at(now + ChronoDuration::seconds(1));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.recent, 2);
        assert_eq!(stats.by_type.get("InternalError"), Some(&2));
        assert_eq!(stats.by_type.get("NotFound"), Some(&1));
    }

    #[test]
    fn test_from_error_captures_name_and_chain() {
        let err = OuterError(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let tracked = TrackedError::from_error(&err);

        assert_eq!(tracked.name, "OuterError");
        assert_eq!(tracked.message, "outer failure");
        assert_eq!(tracked.stack, vec!["disk gone".to_string()]);
    }

    #[test]
    fn test_from_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new("exploded");
        assert_eq!(TrackedError::from_panic(payload.as_ref()).message, "exploded");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(TrackedError::from_panic(payload.as_ref()).message, "owned");
    }

    #[test]
    fn test_context_serializes_extra_fields_flat() {
        let context = ErrorContext::action("api-error")
            .with_store("s1")
            .with("orderId", "o1");
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["action"], "api-error");
        assert_eq!(json["storeId"], "s1");
        assert_eq!(json["orderId"], "o1");
        assert!(json.get("userId").is_none());
    }
}
