use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use super::parse_body;
use crate::error::Result;
use crate::key_generator::{authenticate, ClientId};
use crate::models::Store;
use crate::rate_limit_config::LimiterKind;
use crate::state::SharedState;
use crate::validation::StoreInput;

/// Create a store owned by the caller
pub async fn create_store(
    State(state): State<SharedState>,
    client: ClientId,
    headers: HeaderMap,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Store>> {
    state.rate_limit(LimiterKind::Auth, &client)?;
    let user = authenticate(&headers)?;
    let input: StoreInput = parse_body(payload)?;

    let store = state.catalog.create_store(&user.user_id, input.name).await?;
    tracing::info!(store_id = %store.id, user_id = %user.user_id, "Store created");

    Ok(Json(store))
}

/// The caller's stores, oldest first
pub async fn list_stores(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Store>>> {
    let user = authenticate(&headers)?;
    Ok(Json(state.catalog.stores_for_user(&user.user_id).await?))
}
