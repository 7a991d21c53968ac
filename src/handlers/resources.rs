//! Billboards, categories, colors and sizes share one set of handlers.

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{invalidate, owned_store, parse_body, parse_item_id, parse_store_id, validated_id};
use crate::cache::cache_keys;
use crate::catalog::Record;
use crate::error::{AppError, Result};
use crate::key_generator::{authenticate, ClientId};
use crate::models::{Billboard, Category, Color, Size};
use crate::rate_limit_config::LimiterKind;
use crate::state::{AppState, SharedState};
use crate::validation::{BillboardInput, CategoryInput, ColorInput, SizeInput, Schema};

/// A store-scoped record managed through the generic handlers below.
#[async_trait]
pub trait Resource: Record + Serialize + DeserializeOwned {
    type Input: Schema + Send;

    /// Limiter charged for create and delete.
    const LIMITER: LimiterKind;

    fn cache_key(store_id: Uuid) -> String;

    /// Build a new record, checking that anything it references exists.
    async fn build(state: &AppState, store_id: Uuid, input: Self::Input) -> Result<Self>;
}

#[async_trait]
impl Resource for Billboard {
    type Input = BillboardInput;
    const LIMITER: LimiterKind = LimiterKind::Uploads;

    fn cache_key(store_id: Uuid) -> String {
        cache_keys::billboards(store_id)
    }

    async fn build(_state: &AppState, store_id: Uuid, input: BillboardInput) -> Result<Self> {
        Ok(Billboard {
            id: Uuid::new_v4(),
            store_id,
            label: input.label,
            image_url: input.image_url,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Resource for Category {
    type Input = CategoryInput;
    const LIMITER: LimiterKind = LimiterKind::Api;

    fn cache_key(store_id: Uuid) -> String {
        cache_keys::categories(store_id)
    }

    async fn build(state: &AppState, store_id: Uuid, input: CategoryInput) -> Result<Self> {
        let billboard_id = validated_id(&input.billboard_id)?;
        state
            .catalog
            .get::<Billboard>(store_id, billboard_id)
            .await?
            .ok_or(AppError::NotFound(Billboard::NOT_FOUND))?;

        Ok(Category {
            id: Uuid::new_v4(),
            store_id,
            billboard_id,
            name: input.name,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Resource for Color {
    type Input = ColorInput;
    const LIMITER: LimiterKind = LimiterKind::Api;

    fn cache_key(store_id: Uuid) -> String {
        cache_keys::colors(store_id)
    }

    async fn build(_state: &AppState, store_id: Uuid, input: ColorInput) -> Result<Self> {
        Ok(Color {
            id: Uuid::new_v4(),
            store_id,
            name: input.name,
            value: input.value,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Resource for Size {
    type Input = SizeInput;
    const LIMITER: LimiterKind = LimiterKind::Api;

    fn cache_key(store_id: Uuid) -> String {
        cache_keys::sizes(store_id)
    }

    async fn build(_state: &AppState, store_id: Uuid, input: SizeInput) -> Result<Self> {
        Ok(Size {
            id: Uuid::new_v4(),
            store_id,
            name: input.name,
            value: input.value,
            created_at: Utc::now(),
        })
    }
}

/// List a store's records, newest first
pub async fn list<R: Resource>(
    State(state): State<SharedState>,
    Path(store_id): Path<String>,
) -> Result<Json<Value>> {
    let store_id = parse_store_id(&store_id)?;

    let catalog = &state.catalog;
    let records = state
        .cache
        .get_or_try_insert_with(
            &R::cache_key(store_id),
            state.cache.default_ttl(),
            move || async move {
                let records = catalog.list::<R>(store_id).await?;
                Ok(serde_json::to_value(records)?)
            },
        )
        .await?;

    Ok(Json(records))
}

/// Fetch one record
pub async fn get_one<R: Resource>(
    State(state): State<SharedState>,
    Path((store_id, id)): Path<(String, String)>,
) -> Result<Json<R>> {
    let store_id = parse_store_id(&store_id)?;
    let id = parse_item_id(&id, R::NOT_FOUND)?;

    let record = state
        .catalog
        .get::<R>(store_id, id)
        .await?
        .ok_or(AppError::NotFound(R::NOT_FOUND))?;

    Ok(Json(record))
}

/// Create a record in a store owned by the caller
pub async fn create<R: Resource>(
    State(state): State<SharedState>,
    client: ClientId,
    headers: HeaderMap,
    Path(store_id): Path<String>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<R>> {
    state.rate_limit(R::LIMITER, &client)?;
    let user = authenticate(&headers)?;
    let store_id = parse_store_id(&store_id)?;
    let input: R::Input = parse_body(payload)?;

    owned_store(&state, store_id, &user).await?;
    let record = R::build(&state, store_id, input).await?;
    let record = state.catalog.insert(record).await?;
    invalidate(&state, &R::cache_key(store_id))?;

    tracing::info!(
        store_id = %store_id,
        id = %record.id(),
        user_id = %user.user_id,
        "Record created"
    );

    Ok(Json(record))
}

/// Delete a record from a store owned by the caller
pub async fn delete<R: Resource>(
    State(state): State<SharedState>,
    client: ClientId,
    headers: HeaderMap,
    Path((store_id, id)): Path<(String, String)>,
) -> Result<Json<R>> {
    state.rate_limit(R::LIMITER, &client)?;
    let user = authenticate(&headers)?;
    let store_id = parse_store_id(&store_id)?;
    let id = parse_item_id(&id, R::NOT_FOUND)?;

    owned_store(&state, store_id, &user).await?;
    let removed = state
        .catalog
        .remove::<R>(store_id, id)
        .await?
        .ok_or(AppError::NotFound(R::NOT_FOUND))?;
    invalidate(&state, &R::cache_key(store_id))?;

    Ok(Json(removed))
}
