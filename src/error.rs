use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::error_tracker::TrackedError;
use crate::rate_limiter::RateLimitDecision;
use crate::validation::ValidationFailure;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{label}: {failure}")]
    Validation {
        label: &'static str,
        failure: ValidationFailure,
    },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Unauthorized")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Too many requests")]
    RateLimited(RateLimitDecision),

    #[error("Payment gateway not configured")]
    PaymentUnavailable,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(failure: ValidationFailure) -> Self {
        AppError::Validation {
            label: "Validation failed",
            failure,
        }
    }

    pub fn store_id(failure: ValidationFailure) -> Self {
        AppError::Validation {
            label: "Store ID validation failed",
            failure,
        }
    }

    /// Short name recorded by the error tracker.
    pub fn name(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "ValidationError",
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::Unauthenticated => "Unauthenticated",
            AppError::Forbidden => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::RateLimited(_) => "RateLimitExceeded",
            AppError::PaymentUnavailable => "PaymentUnavailable",
            AppError::Serialization(_) => "SerializationError",
            AppError::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::PaymentUnavailable => StatusCode::BAD_REQUEST,
            AppError::Serialization(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimited(decision) => {
                crate::response::rate_limited(&decision).into_response()
            }
            AppError::Serialization(_) | AppError::Internal(_) => {
                // Details stay server side; the tracking middleware picks them up.
                let tracked = TrackedError::from_app_error(&self);
                let mut response =
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error").into_response();
                response.extensions_mut().insert(tracked);
                response
            }
            other => (other.status(), other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_messages() {
        let err = AppError::validation(ValidationFailure::new(vec![
            "name: Name is required".to_string(),
            "images: At least one image is required".to_string(),
        ]));
        assert_eq!(
            err.to_string(),
            "Validation failed: name: Name is required, images: At least one image is required"
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_error_hides_details() {
        let response = AppError::Internal("lock poisoned".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<TrackedError>().is_some());
    }

    #[test]
    fn forbidden_reads_unauthorized() {
        assert_eq!(AppError::Forbidden.to_string(), "Unauthorized");
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
    }
}
