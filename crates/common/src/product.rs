//! Catalog product model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId};

/// A product row as held by the durable store.
///
/// `stock` is authoritative and never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: i64,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub shop_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock: i64,
    #[serde(default)]
    pub image_url: String,
}

/// Editable product details.
///
/// Stock is absent: it only moves through checkout and restock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub image_url: String,
}
