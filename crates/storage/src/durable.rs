use async_trait::async_trait;
use common::{NewProduct, Order, OrderId, OrderStatus, Product, ProductId, ProductUpdate};

use crate::Result;

/// Core trait for the durable system of record.
///
/// Product stock held here is authoritative. It is never set directly: it
/// moves only through the conditional decrement of a transaction and through
/// `increase_stock`. Increases that would overflow fail with
/// `StoreError::OutOfRange`. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Transaction handle returned by [`DurableStore::begin`].
    type Tx: DurableTransaction + 'static;

    /// Opens a transaction.
    ///
    /// Dropping the handle without calling `commit` rolls it back.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Inserts a product and returns it with its assigned id.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Retrieves a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Updates the editable details of a product.
    ///
    /// Returns None if the product doesn't exist.
    async fn update_product(&self, id: ProductId, update: ProductUpdate)
    -> Result<Option<Product>>;

    /// Deletes a product. Returns true if a row was removed.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;

    /// Adds `quantity` units to a product's stock.
    ///
    /// Returns None if the product doesn't exist.
    async fn increase_stock(&self, id: ProductId, quantity: i64) -> Result<Option<Product>>;

    /// Retrieves an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;
}

/// Operations available inside a durable transaction.
#[async_trait]
pub trait DurableTransaction: Send {
    /// Conditionally decrements stock:
    /// `stock = stock - quantity WHERE id = product AND stock >= quantity`.
    ///
    /// Returns the number of rows affected. Zero means the product is missing
    /// or has insufficient stock; the row is left untouched either way.
    async fn decrement_stock(&mut self, id: ProductId, quantity: i64) -> Result<u64>;

    /// Adds `quantity` units to a product's stock.
    ///
    /// Returns the number of rows affected; zero means the product is gone.
    async fn increase_stock(&mut self, id: ProductId, quantity: i64) -> Result<u64>;

    /// Reads a product as seen by this transaction.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Reads an order with its items as seen by this transaction.
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Persists an order row and all its items.
    async fn create_order_with_items(&mut self, order: &Order) -> Result<()>;

    /// Moves an order from `from` to `to`.
    ///
    /// Returns false, changing nothing, if the order is missing or its status
    /// is no longer `from`.
    async fn update_order_status(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool>;

    /// Commits every write made through this handle.
    async fn commit(self) -> Result<()>;

    /// Discards every write made through this handle.
    async fn rollback(self) -> Result<()>;
}
