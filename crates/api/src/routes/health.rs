//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use storage::{CounterStore, DurableStore, ObjectCache};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub durable_store: &'static str,
    pub counter_store: &'static str,
}

/// GET /health: liveness plus the backends in use.
pub async fn check<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Json<HealthResponse>
where
    S: DurableStore + Clone + 'static,
    C: CounterStore + ObjectCache + Clone + 'static,
{
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        durable_store: state.backends.durable,
        counter_store: state.backends.counters,
    })
}
