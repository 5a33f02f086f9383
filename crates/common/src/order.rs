//! Order model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, Product, ProductId, UserId};

/// Lifecycle status of an order.
///
/// Transitions:
/// ```text
/// Pending ──► Paid ──► Shipped ──► Delivered ──► Completed
/// Pending, Paid ──► Cancelled
/// Paid, Delivered, Completed ──► Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Returns the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Returns true if an order in this status may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Shipped)
                | (Paid, Cancelled)
                | (Paid, Refunded)
                | (Shipped, Delivered)
                | (Delivered, Completed)
                | (Delivered, Refunded)
                | (Completed, Refunded)
        )
    }

    /// Returns true if moving to `next` gives the ordered stock back.
    ///
    /// Only orders that have not shipped return their units.
    pub fn releases_stock(&self, next: OrderStatus) -> bool {
        next == OrderStatus::Cancelled && matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => OrderStatus::Pending,
            "paid" => OrderStatus::Paid,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            _ => return None,
        })
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery contact captured with the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip_code: String,
}

/// A requested line at checkout: which product and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl NewOrderLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A persisted order line with the product snapshot taken at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

impl OrderItem {
    /// Captures name, image and price from `product`.
    ///
    /// Returns `None` if the subtotal overflows.
    pub fn from_snapshot(product: &Product, quantity: i64) -> Option<Self> {
        let subtotal = product.price.checked_mul(quantity)?;
        Some(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            product_image: product.image_url.clone(),
            unit_price: product.price,
            quantity,
            subtotal,
        })
    }
}

/// An order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    /// Sum of line subtotals.
    pub total_amount: Money,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    /// `total_amount - discount_amount + shipping_fee`.
    pub actual_amount: Money,
    pub shipping: ShippingInfo,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Returns the number of units across all lines.
    pub fn unit_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}
