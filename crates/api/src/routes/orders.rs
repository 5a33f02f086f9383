//! Checkout and order lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Order, OrderId, OrderStatus};
use inventory::PlaceOrder;
use serde::Deserialize;
use storage::{CounterStore, DurableStore, ObjectCache};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// POST /orders: reserve stock for every line and place the order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Json(req): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let order = state.checkout.place_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/:id: load a placed order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;

    let order = state
        .checkout
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order))
}

/// PATCH /orders/:id/status: move an order along its lifecycle.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, ApiError>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;

    let order = state
        .checkout
        .update_order_status(order_id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))
}
