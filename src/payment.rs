//! Seam to the third-party payment gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

/// What the gateway needs to collect payment for one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub purpose: String,
    pub amount: f64,
    pub buyer_name: String,
    pub email: String,
    pub phone: String,
    pub redirect_url: String,
    pub webhook_url: String,
}

/// Where the customer completes payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub long_url: String,
    pub short_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment gateway not configured")]
    NotConfigured,

    #[error("Payment request rejected: {0}")]
    Rejected(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured => AppError::PaymentUnavailable,
            PaymentError::Rejected(msg) => {
                AppError::Internal(format!("Failed to create payment request: {}", msg))
            }
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Identifier reported back to the storefront as the payment method.
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    async fn create_payment_request(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentLink, PaymentError>;
}

/// Gateway used when no provider credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn create_payment_request(
        &self,
        _request: PaymentRequest,
    ) -> Result<PaymentLink, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}
