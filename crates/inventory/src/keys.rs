//! Cache key layout.

use common::ProductId;

/// Key of the fast-path stock counter for a product.
pub fn stock_key(id: ProductId) -> String {
    format!("stock:{id}")
}

/// Key of the cached product detail object.
pub fn detail_key(id: ProductId) -> String {
    format!("product:{id}")
}
