//! Inventory error types.

use common::{OrderStatus, ProductId};
use storage::StoreError;
use thiserror::Error;

/// Errors that can occur while reserving stock or placing an order.
///
/// Counter store failures never show up here: the reservation engine absorbs
/// them and falls back to the durable store.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The caller broke the contract (non-positive quantity, empty order,
    /// negative amounts). Raised before any store access.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough stock for the requested quantity.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// The product vanished between the stock decrement and the snapshot read.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order cannot move from its current status to the requested one.
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The durable store failed.
    #[error("Durable store error: {0}")]
    Durable(#[from] StoreError),

    /// The durable store did not answer within the configured timeout.
    #[error("Durable store timed out during {operation}")]
    DurableTimeout { operation: &'static str },
}

impl InventoryError {
    /// Returns the product that ran out of stock, if this is a stock failure.
    pub fn insufficient_product(&self) -> Option<ProductId> {
        match self {
            InventoryError::InsufficientStock { product_id } => Some(*product_id),
            _ => None,
        }
    }
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
