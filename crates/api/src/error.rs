//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use storage::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout or catalog error.
    Inventory(InventoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Inventory(err) => inventory_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn inventory_error_to_response(err: InventoryError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        InventoryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        InventoryError::InsufficientStock { product_id } => {
            return (
                StatusCode::CONFLICT,
                serde_json::json!({
                    "error": err.to_string(),
                    "product_id": product_id,
                }),
            );
        }
        InventoryError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        InventoryError::InvalidTransition { .. } => StatusCode::CONFLICT,
        InventoryError::Durable(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        InventoryError::Durable(StoreError::OutOfRange(_)) => StatusCode::BAD_REQUEST,
        InventoryError::DurableTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InventoryError::Durable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "internal server error");
    }
    (status, serde_json::json!({ "error": err.to_string() }))
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderStatus, ProductId};

    fn status_of(err: InventoryError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_inventory_error_status_mapping() {
        assert_eq!(
            status_of(InventoryError::InvalidArgument("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(InventoryError::InsufficientStock {
                product_id: ProductId::new(1)
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(InventoryError::ProductNotFound(ProductId::new(1))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(InventoryError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(InventoryError::Durable(StoreError::Conflict(
                "order changed concurrently".to_string()
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(InventoryError::Durable(StoreError::OutOfRange(
                "stock would overflow".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(InventoryError::DurableTimeout { operation: "begin" }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(InventoryError::Durable(StoreError::Unavailable(
                "down".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_and_bad_request() {
        assert_eq!(
            ApiError::NotFound("x".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("x".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
