use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{parse_body, parse_store_id, validated_id};
use crate::error::{AppError, Result};
use crate::key_generator::ClientId;
use crate::models::Order;
use crate::payment::PaymentRequest;
use crate::rate_limit_config::LimiterKind;
use crate::state::SharedState;
use crate::validation::CheckoutInput;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub payment_url: String,
    pub short_url: Option<String>,
    pub order_id: Uuid,
    pub method: &'static str,
}

/// Create an unpaid order for the requested products and hand the customer
/// over to the payment gateway.
pub async fn checkout(
    State(state): State<SharedState>,
    client: ClientId,
    Path(store_id): Path<String>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    state.rate_limit(LimiterKind::Api, &client)?;
    let store_id = parse_store_id(&store_id)?;
    let input: CheckoutInput = parse_body(payload)?;

    let gateway = &state.payments;
    if !gateway.is_available() {
        return Err(AppError::PaymentUnavailable);
    }

    let product_ids = input
        .product_ids
        .iter()
        .map(|id| validated_id(id))
        .collect::<Result<Vec<_>>>()?;
    let products = state.catalog.products_by_ids(store_id, &product_ids).await?;
    if products.is_empty() {
        return Err(AppError::InvalidRequest("No products found".to_string()));
    }

    let total: f64 = products.iter().map(|product| product.price).sum();
    let customer = input.customer_info;

    let order = state
        .catalog
        .insert(Order {
            id: Uuid::new_v4(),
            store_id,
            is_paid: false,
            phone: customer.phone.clone().unwrap_or_default(),
            address: customer.address.clone().unwrap_or_default(),
            product_ids: products.iter().map(|product| product.id).collect(),
            total,
            created_at: Utc::now(),
        })
        .await?;

    let names: Vec<&str> = products.iter().map(|product| product.name.as_str()).collect();
    let public_url = state.config.public_app_url.trim_end_matches('/');
    let request = PaymentRequest {
        purpose: format!("Order #{} - {}", order.id, names.join(", ")),
        amount: total,
        buyer_name: customer.name.unwrap_or_else(|| "Customer".to_string()),
        email: customer.email.unwrap_or_default(),
        phone: customer.phone.unwrap_or_default(),
        redirect_url: format!("{}/cart?success=1&orderId={}", public_url, order.id),
        webhook_url: format!("{}/api/webhook/payment", public_url),
    };

    let link = gateway.create_payment_request(request).await?;

    tracing::info!(
        store_id = %store_id,
        order_id = %order.id,
        total,
        gateway = gateway.name(),
        "Checkout started"
    );

    Ok(Json(CheckoutResponse {
        success: true,
        payment_url: link.long_url,
        short_url: link.short_url,
        order_id: order.id,
        method: gateway.name(),
    }))
}
