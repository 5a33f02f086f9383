//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{NewProduct, Product, ProductId, ProductUpdate};
use serde::{Deserialize, Serialize};
use storage::{CounterStore, DurableStore, ObjectCache};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: i64,
}

#[derive(Serialize)]
pub struct CounterResponse {
    pub product_id: ProductId,
    pub stock: i64,
}

/// POST /products: create a product and warm its cache entries.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Json(req): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let product = state.catalog.create_product(req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/:id: read a product through the detail cache.
#[tracing::instrument(skip(state))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let product_id = parse_product_id(&id)?;
    let product = state
        .catalog
        .get_product(product_id)
        .await?
        .ok_or_else(|| not_found(product_id))?;
    Ok(Json(product))
}

/// PUT /products/:id: update name, description, price and image.
#[tracing::instrument(skip(state, req))]
pub async fn update<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    Json(req): Json<ProductUpdate>,
) -> Result<Json<Product>, ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let product_id = parse_product_id(&id)?;
    let product = state
        .catalog
        .update_product(product_id, req)
        .await?
        .ok_or_else(|| not_found(product_id))?;
    Ok(Json(product))
}

/// DELETE /products/:id
#[tracing::instrument(skip(state))]
pub async fn delete<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let product_id = parse_product_id(&id)?;
    if state.catalog.delete_product(product_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(product_id))
    }
}

/// POST /products/:id/restock: add stock.
#[tracing::instrument(skip(state, req))]
pub async fn restock<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<Product>, ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let product_id = parse_product_id(&id)?;
    let product = state
        .catalog
        .restock(product_id, req.quantity)
        .await?
        .ok_or_else(|| not_found(product_id))?;
    Ok(Json(product))
}

/// POST /products/:id/sync: reload the stock counter from the durable store.
#[tracing::instrument(skip(state))]
pub async fn sync_counter<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<CounterResponse>, ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let product_id = parse_product_id(&id)?;
    let stock = state
        .catalog
        .sync_counter(product_id)
        .await?
        .ok_or_else(|| not_found(product_id))?;
    Ok(Json(CounterResponse { product_id, stock }))
}

fn parse_product_id(id: &str) -> Result<ProductId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))
}

fn not_found(id: ProductId) -> ApiError {
    ApiError::NotFound(format!("Product {id} not found"))
}
