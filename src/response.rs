use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::rate_limiter::RateLimitDecision;
use crate::utils::{now_millis, retry_after_secs};

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Attach the `X-RateLimit-*` headers describing `decision`.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset_time));
}

/// `429 Too many requests` with retry guidance.
pub fn rate_limited(decision: &RateLimitDecision) -> Response {
    rate_limited_at(decision, now_millis())
}

pub fn rate_limited_at(decision: &RateLimitDecision, now: u64) -> Response {
    let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
    let headers = response.headers_mut();
    apply_rate_limit_headers(headers, decision);
    headers.insert(
        RETRY_AFTER,
        HeaderValue::from(retry_after_secs(decision.reset_time, now)),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_response_headers() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 30,
            remaining: 0,
            reset_time: 61_500,
        };

        let response = rate_limited_at(&decision, 1_000);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers[RATE_LIMIT_LIMIT], "30");
        assert_eq!(headers[RATE_LIMIT_REMAINING], "0");
        assert_eq!(headers[RATE_LIMIT_RESET], "61500");
        assert_eq!(headers[RETRY_AFTER], "61");
    }
}
