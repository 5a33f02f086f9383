//! Shared types for the inventory and checkout crates.
//!
//! Identifiers are decoded once into these types at the edge of the system
//! (request bodies, path parameters, database rows) and passed around typed
//! from then on.

pub mod money;
pub mod order;
pub mod product;
pub mod types;

pub use money::Money;
pub use order::{NewOrderLine, Order, OrderItem, OrderStatus, ShippingInfo};
pub use product::{NewProduct, Product, ProductUpdate};
pub use types::{IdParseError, OrderId, ProductId, UserId};
