use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{NewProduct, Order, OrderId, OrderStatus, Product, ProductId, ProductUpdate};

use crate::{DurableStore, DurableTransaction, Result, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    next_product_id: i64,
    fail_on_decrement: bool,
    fail_on_create_order: bool,
    fail_on_commit: bool,
    decrement_latency: Duration,
    commit_ack_latency: Duration,
    transactions_started: u64,
}

impl MemoryState {
    fn add_stock(&mut self, id: ProductId, quantity: i64) -> Result<Option<&mut Product>> {
        let Some(product) = self.products.get_mut(&id) else {
            return Ok(None);
        };
        product.stock = product.stock.checked_add(quantity).ok_or_else(|| {
            StoreError::OutOfRange(format!("stock of product {id} would overflow"))
        })?;
        product.updated_at = Utc::now();
        Ok(Some(product))
    }

    fn undo(&mut self, stock_changes: &[(ProductId, i64)], status_changes: &[(OrderId, OrderStatus)]) {
        for (id, previous) in status_changes.iter().rev() {
            if let Some(order) = self.orders.get_mut(id) {
                order.status = *previous;
            }
        }
        for (id, delta) in stock_changes.iter().rev() {
            if let Some(product) = self.products.get_mut(id) {
                product.stock = product.stock.saturating_sub(*delta);
            }
        }
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory durable store for tests and local runs.
///
/// Stock changes and order status changes made in a transaction are applied
/// to the shared rows as soon as they succeed and are undone on rollback.
/// Concurrent transactions therefore see each other's uncommitted changes,
/// which is stricter than row locking but keeps the same guarantee: stock
/// never goes below zero. New orders are staged and inserted on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDurableStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryDurableStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent conditional decrement fail with an error.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        lock(&self.state).fail_on_decrement = fail;
    }

    /// Makes every subsequent order insert fail with an error.
    pub fn set_fail_on_create_order(&self, fail: bool) {
        lock(&self.state).fail_on_create_order = fail;
    }

    /// Makes every subsequent commit fail (and roll back).
    pub fn set_fail_on_commit(&self, fail: bool) {
        lock(&self.state).fail_on_commit = fail;
    }

    /// Delays every subsequent conditional decrement.
    pub fn set_decrement_latency(&self, latency: Duration) {
        lock(&self.state).decrement_latency = latency;
    }

    /// Delays the reply of every subsequent commit. The commit itself has
    /// already been applied when the delay starts.
    pub fn set_commit_ack_latency(&self, latency: Duration) {
        lock(&self.state).commit_ack_latency = latency;
    }

    /// Returns the current stock of a product.
    pub fn stock_of(&self, id: ProductId) -> Option<i64> {
        lock(&self.state).products.get(&id).map(|p| p.stock)
    }

    /// Returns the number of committed orders.
    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }

    /// Returns the number of transactions opened so far.
    pub fn transactions_started(&self) -> u64 {
        lock(&self.state).transactions_started
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        lock(&self.state).transactions_started += 1;
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            stock_changes: Vec::new(),
            status_changes: Vec::new(),
            orders: Vec::new(),
            finished: false,
        })
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        if product.stock < 0 {
            return Err(StoreError::Conflict("stock must be non-negative".to_string()));
        }
        let mut state = lock(&self.state);
        state.next_product_id += 1;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(state.next_product_id),
            shop_id: product.shop_id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image_url: product.image_url,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(lock(&self.state).products.get(&id).cloned())
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        let mut state = lock(&self.state);
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        product.name = update.name;
        product.description = update.description;
        product.price = update.price;
        product.image_url = update.image_url;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        Ok(lock(&self.state).products.remove(&id).is_some())
    }

    async fn increase_stock(&self, id: ProductId, quantity: i64) -> Result<Option<Product>> {
        let mut state = lock(&self.state);
        Ok(state.add_stock(id, quantity)?.map(|product| product.clone()))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(lock(&self.state).orders.get(&id).cloned())
    }
}

/// Transaction handle for [`InMemoryDurableStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    /// Applied stock deltas, undone on abort.
    stock_changes: Vec<(ProductId, i64)>,
    /// Previous status of every order whose status was changed.
    status_changes: Vec<(OrderId, OrderStatus)>,
    orders: Vec<Order>,
    finished: bool,
}

impl InMemoryTransaction {
    fn abort(&mut self) {
        if !self.finished {
            lock(&self.state).undo(&self.stock_changes, &self.status_changes);
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.stock_changes.clear();
        self.status_changes.clear();
        self.orders.clear();
        self.finished = true;
    }
}

#[async_trait]
impl DurableTransaction for InMemoryTransaction {
    async fn decrement_stock(&mut self, id: ProductId, quantity: i64) -> Result<u64> {
        let latency = lock(&self.state).decrement_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = lock(&self.state);
        if state.fail_on_decrement {
            return Err(StoreError::Unavailable(
                "conditional decrement failed".to_string(),
            ));
        }
        match state.products.get_mut(&id) {
            Some(product) if product.stock >= quantity => {
                product.stock -= quantity;
                product.updated_at = Utc::now();
                drop(state);
                self.stock_changes.push((id, -quantity));
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn increase_stock(&mut self, id: ProductId, quantity: i64) -> Result<u64> {
        let mut state = lock(&self.state);
        if state.add_stock(id, quantity)?.is_none() {
            return Ok(0);
        }
        drop(state);
        self.stock_changes.push((id, quantity));
        Ok(1)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(lock(&self.state).products.get(&id).cloned())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let staged = self.orders.iter().find(|o| o.id == id).cloned();
        Ok(staged.or_else(|| lock(&self.state).orders.get(&id).cloned()))
    }

    async fn create_order_with_items(&mut self, order: &Order) -> Result<()> {
        let state = lock(&self.state);
        if state.fail_on_create_order {
            return Err(StoreError::Unavailable("order insert failed".to_string()));
        }
        if state.orders.contains_key(&order.id) || self.orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        drop(state);
        self.orders.push(order.clone());
        Ok(())
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let moved = match lock(&self.state).orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                true
            }
            _ => false,
        };
        if moved {
            self.status_changes.push((id, from));
        }
        Ok(moved)
    }

    async fn commit(mut self) -> Result<()> {
        let ack_latency = {
            let mut state = lock(&self.state);
            if state.fail_on_commit {
                state.undo(&self.stock_changes, &self.status_changes);
                drop(state);
                self.finish();
                return Err(StoreError::Unavailable("commit failed".to_string()));
            }
            for order in self.orders.drain(..) {
                state.orders.insert(order.id, order);
            }
            state.commit_ack_latency
        };
        self.finish();

        if !ack_latency.is_zero() {
            tokio::time::sleep(ack_latency).await;
        }
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.abort();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.abort();
    }
}
