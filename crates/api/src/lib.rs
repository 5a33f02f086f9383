//! HTTP API server for checkout and the product catalog.
//!
//! Provides REST endpoints for placing orders and managing products,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use inventory::{CatalogService, CheckoutService, ReservationPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use storage::{CounterStore, DurableStore, ObjectCache};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Names of the backends in use, reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Backends {
    pub durable: &'static str,
    pub counters: &'static str,
}

/// Shared application state accessible from all handlers.
pub struct AppState<S, C>
where
    S: DurableStore,
    C: CounterStore + ObjectCache,
{
    pub checkout: CheckoutService<S, C>,
    pub catalog: CatalogService<S, C>,
    pub backends: Backends,
}

/// Creates the application state over a durable store and a counter store.
pub fn create_state<S, C>(
    store: S,
    cache: C,
    policy: ReservationPolicy,
    backends: Backends,
) -> Arc<AppState<S, C>>
where
    S: DurableStore + Clone,
    C: CounterStore + ObjectCache + Clone,
{
    Arc::new(AppState {
        checkout: CheckoutService::new(store.clone(), cache.clone(), policy),
        catalog: CatalogService::new(store, cache, policy),
        backends,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S, C>))
        .route("/orders", post(routes::orders::create::<S, C>))
        .route("/orders/{id}", get(routes::orders::get::<S, C>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S, C>),
        )
        .route("/products", post(routes::products::create::<S, C>))
        .route(
            "/products/{id}",
            get(routes::products::get::<S, C>)
                .put(routes::products::update::<S, C>)
                .delete(routes::products::delete::<S, C>),
        )
        .route(
            "/products/{id}/restock",
            post(routes::products::restock::<S, C>),
        )
        .route(
            "/products/{id}/sync",
            post(routes::products::sync_counter::<S, C>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
