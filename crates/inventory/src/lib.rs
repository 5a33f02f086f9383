//! Stock reservation and checkout.
//!
//! A reservation decrements stock for one order line in two phases:
//! 1. Fast path: an atomic check-and-decrement on the counter store mirror.
//!    A cold or unreachable counter is skipped; a short counter rejects the
//!    request without touching the durable store.
//! 2. Durable commit: a conditional decrement inside the caller's transaction.
//!
//! If the durable phase fails after the fast path applied, the counter is
//! incremented back before the failure is returned. Checkout runs one
//! reservation per line inside a single transaction and, on any failure,
//! rolls back and compensates every fast-path decrement it made.

pub mod catalog;
pub mod checkout;
pub mod error;
pub mod keys;
pub mod limits;
pub mod policy;
pub mod reservation;
pub mod state;

pub use catalog::CatalogService;
pub use checkout::{CheckoutService, PlaceOrder};
pub use error::{InventoryError, Result};
pub use policy::ReservationPolicy;
pub use reservation::{Reservation, StockReservationEngine};
pub use state::ReservationState;
