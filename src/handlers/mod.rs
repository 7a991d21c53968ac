//! HTTP route handlers.
//!
//! Every mutating handler runs the same pipeline: rate limit, authenticate,
//! validate the store id, validate the body, then touch the catalog. Public
//! reads skip the first two steps.

pub mod checkout;
pub mod health;
pub mod products;
pub mod resources;
pub mod stores;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::cache_keys;
use crate::error::{AppError, Result};
use crate::key_generator::AuthUser;
use crate::models::Store;
use crate::state::AppState;
use crate::validation::{validate_request, Schema, StoreIdParams};

/// Validate the `:storeId` path segment.
pub fn parse_store_id(raw: &str) -> Result<Uuid> {
    let params: StoreIdParams =
        validate_request(json!({ "storeId": raw })).map_err(AppError::store_id)?;
    Uuid::parse_str(&params.store_id).map_err(|e| AppError::InvalidRequest(e.to_string()))
}

/// Item ids that are not UUIDs cannot name a record.
pub fn parse_item_id(raw: &str, not_found: &'static str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(not_found))
}

/// Parse an id string that already passed schema validation.
pub(crate) fn validated_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::InvalidRequest(e.to_string()))
}

/// Unwrap the JSON body and run it through the schema for `T`.
pub fn parse_body<T>(payload: std::result::Result<Json<Value>, JsonRejection>) -> Result<T>
where
    T: Schema,
{
    let Json(body) = payload?;
    validate_request(body).map_err(AppError::validation)
}

/// The store, when `user` owns it. Unknown and foreign stores look the same.
pub async fn owned_store(state: &AppState, store_id: Uuid, user: &AuthUser) -> Result<Store> {
    let catalog = &state.catalog;
    let cached = state
        .cache
        .get_or_try_insert_with(
            &cache_keys::store(store_id),
            state.cache.default_ttl(),
            move || async move {
                let store = catalog.store(store_id).await?.ok_or(AppError::Forbidden)?;
                Ok(serde_json::to_value(store)?)
            },
        )
        .await?;

    let store: Store = serde_json::from_value(cached)?;
    if store.user_id == user.user_id {
        Ok(store)
    } else {
        Err(AppError::Forbidden)
    }
}

/// Drop the cached listing behind `key` after a mutation.
pub fn invalidate(state: &AppState, key: &str) -> Result<()> {
    if state.cache.delete(key)? {
        tracing::debug!(key, "Invalidated cached listing");
    }
    Ok(())
}
