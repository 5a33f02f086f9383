//! Two-phase stock reservation.

use common::ProductId;
use storage::{CounterStore, DecrementOutcome, DurableTransaction};

use crate::keys::{detail_key, stock_key};
use crate::{InventoryError, ReservationPolicy, ReservationState, Result};

/// The outcome of a successful [`StockReservationEngine::reserve`] call.
///
/// Carries the fast-path hold, if any, so the caller can give it back when a
/// later step of the same checkout fails. Not `Clone`: a hold is released at
/// most once.
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    product_id: ProductId,
    quantity: i64,
    state: ReservationState,
    fast_path_hold: Option<i64>,
}

impl Reservation {
    fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            state: ReservationState::Pending,
            fast_path_hold: None,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn state(&self) -> ReservationState {
        self.state
    }

    /// Returns true while a fast-path decrement is outstanding.
    pub fn holds_fast_path(&self) -> bool {
        self.fast_path_hold.is_some()
    }
}

/// Reserves stock for one order line: counter store first, durable store second.
///
/// The counter store is only a guard. A missing, failing or slow counter never
/// fails a reservation; the durable conditional decrement decides.
pub struct StockReservationEngine<C>
where
    C: CounterStore,
{
    counters: C,
    policy: ReservationPolicy,
}

impl<C> StockReservationEngine<C>
where
    C: CounterStore,
{
    /// Creates a new reservation engine.
    pub fn new(counters: C, policy: ReservationPolicy) -> Self {
        Self { counters, policy }
    }

    /// Returns the timeouts in effect.
    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    /// Reserves `quantity` units of a product inside the caller's transaction.
    ///
    /// On error, any fast-path decrement made by this call has already been
    /// given back.
    #[tracing::instrument(skip(self, tx), fields(product_id = %product_id))]
    pub async fn reserve<T>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Reservation>
    where
        T: DurableTransaction,
    {
        if quantity <= 0 {
            metrics::counter!("stock_reservations_total", "outcome" => "invalid_argument")
                .increment(1);
            return Err(InventoryError::InvalidArgument(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let mut reservation = Reservation::new(product_id, quantity);
        let key = stock_key(product_id);

        // Phase 1: counter store guard
        match self
            .policy
            .cache(
                "decrement_with_floor",
                &key,
                self.counters.decrement_with_floor(&key, quantity),
            )
            .await
        {
            Some(DecrementOutcome::Applied { remaining }) => {
                metrics::counter!("stock_fast_path_total", "result" => "applied").increment(1);
                tracing::debug!(remaining, "fast path applied");
                reservation.fast_path_hold = Some(quantity);
                reservation.state = ReservationState::FastPathChecked;
            }
            Some(DecrementOutcome::Rejected { current }) => {
                metrics::counter!("stock_fast_path_total", "result" => "rejected").increment(1);
                metrics::counter!("stock_reservations_total", "outcome" => "rejected_fast_path")
                    .increment(1);
                tracing::info!(current, quantity, "fast path rejected reservation");
                return Err(InventoryError::InsufficientStock { product_id });
            }
            Some(DecrementOutcome::Missing) => {
                metrics::counter!("stock_fast_path_total", "result" => "miss").increment(1);
                tracing::debug!("stock counter not cached, using durable store only");
            }
            None => {
                metrics::counter!("stock_fast_path_total", "result" => "unavailable").increment(1);
            }
        }

        // Phase 2: durable conditional decrement
        debug_assert!(reservation.state.can_commit());
        let decremented = self
            .policy
            .durable("decrement_stock", tx.decrement_stock(product_id, quantity))
            .await;

        match decremented {
            Ok(rows) if rows > 0 => {
                reservation.state = ReservationState::DurableCommitted;
                metrics::counter!("stock_reservations_total", "outcome" => "committed")
                    .increment(1);
                self.invalidate_detail(product_id).await;
                Ok(reservation)
            }
            Ok(_) => {
                metrics::counter!("stock_reservations_total", "outcome" => "insufficient_stock")
                    .increment(1);
                tracing::info!(quantity, "durable store rejected reservation");
                self.compensate(&mut reservation).await;
                Err(InventoryError::InsufficientStock { product_id })
            }
            Err(e) => {
                metrics::counter!("stock_reservations_total", "outcome" => "durable_error")
                    .increment(1);
                tracing::warn!(error = %e, "durable decrement failed");
                self.compensate(&mut reservation).await;
                Err(e)
            }
        }
    }

    /// Gives back the fast-path decrement held by a reservation.
    ///
    /// Returns true if a hold was released by this call. The counter is only
    /// incremented if its key still exists; failures are logged and not
    /// retried.
    #[tracing::instrument(skip(self, reservation), fields(product_id = %reservation.product_id))]
    pub async fn compensate(&self, reservation: &mut Reservation) -> bool {
        let Some(amount) = reservation.fast_path_hold.take() else {
            if reservation.state.can_compensate() {
                reservation.state = ReservationState::Failed;
            }
            return false;
        };
        reservation.state = ReservationState::FastPathCompensated;

        let key = stock_key(reservation.product_id);
        let result = match self
            .policy
            .cache(
                "increment_by",
                &key,
                self.counters.increment_by(&key, amount),
            )
            .await
        {
            Some(Some(current)) => {
                tracing::debug!(amount, current, "fast path hold released");
                "restored"
            }
            Some(None) => {
                tracing::debug!(amount, "stock counter gone, nothing to restore");
                "missing"
            }
            None => {
                tracing::warn!(amount, "failed to release fast path hold");
                "failed"
            }
        };
        metrics::counter!("stock_compensations_total", "result" => result).increment(1);
        true
    }

    /// Drops the hold of a reservation whose commit outcome is unknown and
    /// deletes the product's stock counter.
    ///
    /// The counter can be neither restored nor trusted once a commit may or
    /// may not have landed; a cold key sends later reservations to the
    /// durable store until the counter is synced. Returns true if a hold was
    /// dropped by this call.
    #[tracing::instrument(skip(self, reservation), fields(product_id = %reservation.product_id))]
    pub async fn evict(&self, reservation: &mut Reservation) -> bool {
        let Some(amount) = reservation.fast_path_hold.take() else {
            return false;
        };

        let key = stock_key(reservation.product_id);
        let result = match self
            .policy
            .cache("delete", &key, self.counters.delete(&key))
            .await
        {
            Some(_) => "evicted",
            None => {
                tracing::warn!(amount, "failed to evict stock counter");
                "failed"
            }
        };
        metrics::counter!("stock_compensations_total", "result" => result).increment(1);
        true
    }

    /// Adds returned units back to a warm stock counter and drops the cached
    /// detail. A cold counter stays cold.
    pub async fn restore(&self, product_id: ProductId, quantity: i64) {
        let key = stock_key(product_id);
        if self
            .policy
            .cache("increment_by", &key, self.counters.increment_by(&key, quantity))
            .await
            .is_none()
        {
            tracing::warn!(%product_id, quantity, "failed to restore stock counter");
        }
        self.invalidate_detail(product_id).await;
    }

    /// Drops the cached product detail so the next read sees fresh stock.
    pub async fn invalidate_detail(&self, product_id: ProductId) {
        let key = detail_key(product_id);
        self.policy
            .cache("delete", &key, self.counters.delete(&key))
            .await;
    }
}
