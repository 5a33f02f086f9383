//! Checkout orchestration.

use chrono::Utc;
use common::{Money, NewOrderLine, Order, OrderId, OrderItem, OrderStatus, ShippingInfo, UserId};
use serde::{Deserialize, Serialize};
use storage::{CounterStore, DurableStore, DurableTransaction, StoreError};

use crate::limits::{
    SHIPPING_ADDRESS_MAX, SHIPPING_NAME_MAX, SHIPPING_PHONE_MAX, SHIPPING_ZIP_CODE_MAX,
    check_length,
};
use crate::{InventoryError, Reservation, ReservationPolicy, Result, StockReservationEngine};

/// Request to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub items: Vec<NewOrderLine>,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub shipping_fee: Money,
    #[serde(default)]
    pub shipping: ShippingInfo,
}

impl PlaceOrder {
    /// Creates a request with no discount, no shipping fee and empty
    /// shipping details.
    pub fn new(user_id: UserId, items: Vec<NewOrderLine>) -> Self {
        Self {
            user_id,
            items,
            discount_amount: Money::zero(),
            shipping_fee: Money::zero(),
            shipping: ShippingInfo::default(),
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount_amount = discount;
        self
    }

    pub fn with_shipping_fee(mut self, fee: Money) -> Self {
        self.shipping_fee = fee;
        self
    }

    pub fn with_shipping(mut self, shipping: ShippingInfo) -> Self {
        self.shipping = shipping;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(InventoryError::InvalidArgument(
                "order has no items".to_string(),
            ));
        }
        if let Some(line) = self.items.iter().find(|line| line.quantity <= 0) {
            return Err(InventoryError::InvalidArgument(format!(
                "quantity for product {} must be positive, got {}",
                line.product_id, line.quantity
            )));
        }
        if self.discount_amount.is_negative() {
            return Err(InventoryError::InvalidArgument(
                "discount must not be negative".to_string(),
            ));
        }
        if self.shipping_fee.is_negative() {
            return Err(InventoryError::InvalidArgument(
                "shipping fee must not be negative".to_string(),
            ));
        }
        check_length("shipping name", &self.shipping.name, SHIPPING_NAME_MAX)?;
        check_length("shipping phone", &self.shipping.phone, SHIPPING_PHONE_MAX)?;
        check_length("shipping address", &self.shipping.address, SHIPPING_ADDRESS_MAX)?;
        check_length("zip code", &self.shipping.zip_code, SHIPPING_ZIP_CODE_MAX)?;
        Ok(())
    }
}

/// Places orders: reserves every line inside one durable transaction and
/// persists the order, or leaves no trace at all.
///
/// On failure the transaction is rolled back and every fast-path decrement
/// taken during the checkout is given back, latest first.
pub struct CheckoutService<S, C>
where
    S: DurableStore,
    C: CounterStore,
{
    store: S,
    engine: StockReservationEngine<C>,
}

impl<S, C> CheckoutService<S, C>
where
    S: DurableStore,
    C: CounterStore,
{
    /// Creates a new checkout service.
    pub fn new(store: S, counters: C, policy: ReservationPolicy) -> Self {
        Self {
            store,
            engine: StockReservationEngine::new(counters, policy),
        }
    }

    /// Returns the reservation engine used for each line.
    pub fn engine(&self) -> &StockReservationEngine<C> {
        &self.engine
    }

    fn policy(&self) -> &ReservationPolicy {
        self.engine.policy()
    }

    /// Places an order for the given lines.
    ///
    /// Either every line is reserved and the order is committed, or stock in
    /// both stores is left as it was (up to counter drift) and the error of
    /// the first failing step is returned.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, lines = request.items.len()))]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        request.validate()?;

        let mut tx = self.policy().durable("begin", self.store.begin()).await?;
        let mut reservations = Vec::with_capacity(request.items.len());

        let reserved = self
            .reserve_and_persist(&mut tx, &request, &mut reservations)
            .await;
        let result = match reserved {
            Ok(order) => self
                .policy()
                .durable("commit", tx.commit())
                .await
                .map(|()| order),
            Err(e) => {
                if let Err(rollback_err) = self.policy().durable("rollback", tx.rollback()).await
                {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        };

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);

        match result {
            Ok(order) => {
                for item in &order.items {
                    self.engine.invalidate_detail(item.product_id).await;
                }
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    actual_amount = %order.actual_amount,
                    duration,
                    "order placed"
                );
                Ok(order)
            }
            Err(e @ InventoryError::DurableTimeout { operation: "commit" }) => {
                // The commit may have landed, so the holds are neither given
                // back nor trusted
                let evicted = self.evict(&mut reservations).await;
                metrics::counter!("checkout_failed_total").increment(1);
                tracing::warn!(error = %e, evicted, "commit outcome unknown, stock counters evicted");
                Err(e)
            }
            Err(e) => {
                let released = self.unwind(&mut reservations).await;
                metrics::counter!("checkout_failed_total").increment(1);
                tracing::warn!(error = %e, released, "checkout failed");
                Err(e)
            }
        }
    }

    /// Moves an order to `status`.
    ///
    /// Cancelling an order that has not shipped gives its units back to the
    /// durable stock in the same transaction, then to any warm counters.
    /// Returns `None` if the order does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut tx = self.policy().durable("begin", self.store.begin()).await?;

        let applied = self.apply_status(&mut tx, id, status).await;
        let (order, released) = match applied {
            Ok(Some(applied)) => {
                self.policy().durable("commit", tx.commit()).await?;
                applied
            }
            Ok(None) => return Ok(None),
            Err(e) => {
                if let Err(rollback_err) = self.policy().durable("rollback", tx.rollback()).await
                {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        };

        if released {
            for item in &order.items {
                self.engine.restore(item.product_id, item.quantity).await;
            }
        }

        metrics::counter!("order_status_updates_total", "status" => status.as_str())
            .increment(1);
        tracing::info!(released, "order status updated");
        Ok(Some(order))
    }

    /// Loads a placed order.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.policy().durable("get_order", self.store.get_order(id)).await
    }

    async fn reserve_and_persist(
        &self,
        tx: &mut S::Tx,
        request: &PlaceOrder,
        reservations: &mut Vec<Reservation>,
    ) -> Result<Order> {
        let mut items = Vec::with_capacity(request.items.len());

        for line in &request.items {
            let reservation = self
                .engine
                .reserve(tx, line.product_id, line.quantity)
                .await?;
            reservations.push(reservation);

            let product = self
                .policy()
                .durable("get_product", tx.get_product(line.product_id))
                .await?
                .ok_or(InventoryError::ProductNotFound(line.product_id))?;
            let item = OrderItem::from_snapshot(&product, line.quantity).ok_or_else(|| {
                InventoryError::InvalidArgument(format!(
                    "subtotal for product {} overflows",
                    line.product_id
                ))
            })?;
            items.push(item);
        }

        let order = build_order(request, items)?;
        self.policy()
            .durable(
                "create_order_with_items",
                tx.create_order_with_items(&order),
            )
            .await?;

        Ok(order)
    }

    async fn apply_status(
        &self,
        tx: &mut S::Tx,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<(Order, bool)>> {
        let Some(mut order) = self.policy().durable("get_order", tx.get_order(id)).await? else {
            return Ok(None);
        };

        let from = order.status;
        if !from.can_transition_to(status) {
            return Err(InventoryError::InvalidTransition { from, to: status });
        }
        let moved = self
            .policy()
            .durable(
                "update_order_status",
                tx.update_order_status(id, from, status),
            )
            .await?;
        if !moved {
            return Err(StoreError::Conflict(format!("order {id} changed concurrently")).into());
        }

        let releases = from.releases_stock(status);
        if releases {
            for item in &order.items {
                // A deleted product has nothing to return to
                self.policy()
                    .durable(
                        "increase_stock",
                        tx.increase_stock(item.product_id, item.quantity),
                    )
                    .await?;
            }
        }

        order.status = status;
        Ok(Some((order, releases)))
    }

    /// Drops the holds of a checkout whose commit outcome is unknown.
    /// Returns how many counters were evicted.
    async fn evict(&self, reservations: &mut [Reservation]) -> usize {
        let mut evicted = 0;
        for reservation in reservations.iter_mut() {
            if self.engine.evict(reservation).await {
                evicted += 1;
            }
        }
        evicted
    }

    /// Releases fast-path holds in reverse order. Returns how many were released.
    async fn unwind(&self, reservations: &mut [Reservation]) -> usize {
        let mut released = 0;
        for reservation in reservations.iter_mut().rev() {
            if self.engine.compensate(reservation).await {
                released += 1;
            }
        }
        released
    }
}

fn build_order(request: &PlaceOrder, items: Vec<OrderItem>) -> Result<Order> {
    let overflow = || InventoryError::InvalidArgument("order total overflows".to_string());

    let total_amount = Money::checked_sum(items.iter().map(|item| item.subtotal))
        .ok_or_else(overflow)?;
    let actual_amount = total_amount
        .checked_sub(request.discount_amount)
        .and_then(|amount| amount.checked_add(request.shipping_fee))
        .ok_or_else(overflow)?;
    if actual_amount.is_negative() {
        return Err(InventoryError::InvalidArgument(format!(
            "discount {} exceeds order total {}",
            request.discount_amount, total_amount
        )));
    }

    Ok(Order {
        id: OrderId::new(),
        user_id: request.user_id,
        status: OrderStatus::Pending,
        items,
        total_amount,
        discount_amount: request.discount_amount,
        shipping_fee: request.shipping_fee,
        actual_amount,
        shipping: request.shipping.clone(),
        created_at: Utc::now(),
    })
}
