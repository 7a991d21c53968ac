use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{invalidate, owned_store, parse_body, parse_item_id, parse_store_id, validated_id};
use crate::cache::cache_keys;
use crate::catalog::Record;
use crate::error::{AppError, Result};
use crate::key_generator::{authenticate, ClientId};
use crate::models::{Category, Color, Image, Product, ProductFilter, Size};
use crate::rate_limit_config::LimiterKind;
use crate::state::{AppState, SharedState};
use crate::validation::ProductInput;

/// Resolved references of a validated product payload.
struct ProductRefs {
    category_id: Uuid,
    color_id: Uuid,
    size_id: Uuid,
}

async fn resolve_refs(state: &AppState, store_id: Uuid, input: &ProductInput) -> Result<ProductRefs> {
    let category_id = validated_id(&input.category_id)?;
    let color_id = validated_id(&input.color_id)?;
    let size_id = validated_id(&input.size_id)?;

    let catalog = &state.catalog;
    catalog
        .get::<Category>(store_id, category_id)
        .await?
        .ok_or(AppError::NotFound(Category::NOT_FOUND))?;
    catalog
        .get::<Color>(store_id, color_id)
        .await?
        .ok_or(AppError::NotFound(Color::NOT_FOUND))?;
    catalog
        .get::<Size>(store_id, size_id)
        .await?
        .ok_or(AppError::NotFound(Size::NOT_FOUND))?;

    Ok(ProductRefs {
        category_id,
        color_id,
        size_id,
    })
}

fn images(input: &ProductInput) -> Vec<Image> {
    input
        .images
        .iter()
        .map(|image| Image {
            url: image.url.clone(),
        })
        .collect()
}

/// Storefront listing. The unfiltered list is cached per store; filters apply
/// on top of it.
pub async fn list_products(
    State(state): State<SharedState>,
    Path(store_id): Path<String>,
    filter: std::result::Result<Query<ProductFilter>, QueryRejection>,
) -> Result<Json<Vec<Product>>> {
    let store_id = parse_store_id(&store_id)?;
    let Query(filter) = filter.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let catalog = &state.catalog;
    let cached = state
        .cache
        .get_or_try_insert_with(
            &cache_keys::products(store_id),
            state.cache.default_ttl(),
            move || async move {
                let products = catalog.list::<Product>(store_id).await?;
                Ok(serde_json::to_value(products)?)
            },
        )
        .await?;

    let products: Vec<Product> = serde_json::from_value(cached)?;
    Ok(Json(
        products
            .into_iter()
            .filter(|product| filter.matches(product))
            .collect(),
    ))
}

pub async fn get_product(
    State(state): State<SharedState>,
    Path((store_id, product_id)): Path<(String, String)>,
) -> Result<Json<Product>> {
    let store_id = parse_store_id(&store_id)?;
    let product_id = parse_item_id(&product_id, Product::NOT_FOUND)?;

    let product = state
        .catalog
        .get::<Product>(store_id, product_id)
        .await?
        .ok_or(AppError::NotFound(Product::NOT_FOUND))?;

    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<SharedState>,
    client: ClientId,
    headers: HeaderMap,
    Path(store_id): Path<String>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Product>> {
    state.rate_limit(LimiterKind::Products, &client)?;
    let user = authenticate(&headers)?;
    let store_id = parse_store_id(&store_id)?;
    let input: ProductInput = parse_body(payload)?;

    owned_store(&state, store_id, &user).await?;
    let refs = resolve_refs(&state, store_id, &input).await?;

    let product = Product {
        id: Uuid::new_v4(),
        store_id,
        category_id: refs.category_id,
        color_id: refs.color_id,
        size_id: refs.size_id,
        images: images(&input),
        name: input.name,
        price: input.price,
        is_featured: input.is_featured.unwrap_or(false),
        is_archived: input.is_archived.unwrap_or(false),
        created_at: Utc::now(),
    };
    let product = state.catalog.insert(product).await?;
    invalidate(&state, &cache_keys::products(store_id))?;

    tracing::info!(
        store_id = %store_id,
        product_id = %product.id,
        user_id = %user.user_id,
        "Product created"
    );

    Ok(Json(product))
}

/// Replace a product's fields; id and creation time are kept.
pub async fn update_product(
    State(state): State<SharedState>,
    client: ClientId,
    headers: HeaderMap,
    Path((store_id, product_id)): Path<(String, String)>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Product>> {
    state.rate_limit(LimiterKind::Products, &client)?;
    let user = authenticate(&headers)?;
    let store_id = parse_store_id(&store_id)?;
    let product_id = parse_item_id(&product_id, Product::NOT_FOUND)?;
    let input: ProductInput = parse_body(payload)?;

    owned_store(&state, store_id, &user).await?;
    let existing = state
        .catalog
        .get::<Product>(store_id, product_id)
        .await?
        .ok_or(AppError::NotFound(Product::NOT_FOUND))?;
    let refs = resolve_refs(&state, store_id, &input).await?;

    let updated = Product {
        category_id: refs.category_id,
        color_id: refs.color_id,
        size_id: refs.size_id,
        images: images(&input),
        name: input.name,
        price: input.price,
        is_featured: input.is_featured.unwrap_or(existing.is_featured),
        is_archived: input.is_archived.unwrap_or(existing.is_archived),
        ..existing
    };
    let product = state
        .catalog
        .update(updated)
        .await?
        .ok_or(AppError::NotFound(Product::NOT_FOUND))?;
    invalidate(&state, &cache_keys::products(store_id))?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<SharedState>,
    client: ClientId,
    headers: HeaderMap,
    Path((store_id, product_id)): Path<(String, String)>,
) -> Result<Json<Product>> {
    state.rate_limit(LimiterKind::Products, &client)?;
    let user = authenticate(&headers)?;
    let store_id = parse_store_id(&store_id)?;
    let product_id = parse_item_id(&product_id, Product::NOT_FOUND)?;

    owned_store(&state, store_id, &user).await?;
    let removed = state
        .catalog
        .remove::<Product>(store_id, product_id)
        .await?
        .ok_or(AppError::NotFound(Product::NOT_FOUND))?;
    invalidate(&state, &cache_keys::products(store_id))?;

    Ok(Json(removed))
}
