//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the checkout and reservation metrics.
///
/// Call once after the recorder is installed.
pub fn describe() {
    metrics::describe_counter!(
        "stock_reservations_total",
        "Single-line reservations by outcome"
    );
    metrics::describe_counter!(
        "stock_fast_path_total",
        "Counter store guard results (applied, rejected, miss, unavailable)"
    );
    metrics::describe_counter!(
        "stock_compensations_total",
        "Fast-path holds given back, by result"
    );
    metrics::describe_counter!("checkout_attempts_total", "Orders submitted");
    metrics::describe_counter!("checkout_completed_total", "Orders committed");
    metrics::describe_counter!("checkout_failed_total", "Orders rolled back");
    metrics::describe_counter!(
        "order_status_updates_total",
        "Order status moves by target status"
    );
    metrics::describe_histogram!(
        "checkout_duration_seconds",
        Unit::Seconds,
        "Time from order submission to commit or rollback"
    );
    metrics::describe_counter!("product_cache_total", "Product detail cache lookups");
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
