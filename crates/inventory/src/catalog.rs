//! Product catalog with write-through stock counters and cached details.

use common::{NewProduct, Product, ProductId, ProductUpdate};
use storage::{CounterStore, DurableStore, ObjectCache, ObjectCacheExt, StoreError};

use crate::keys::{detail_key, stock_key};
use crate::limits::{
    PRODUCT_DESCRIPTION_MAX, PRODUCT_IMAGE_URL_MAX, PRODUCT_NAME_MAX, check_length,
};
use crate::{InventoryError, ReservationPolicy, Result};

/// Manages products in the durable store and keeps the cache in step.
///
/// The durable store is the source of truth. Every cache write is best
/// effort: failures are logged and the call still succeeds.
pub struct CatalogService<S, C>
where
    S: DurableStore,
    C: CounterStore + ObjectCache,
{
    store: S,
    cache: C,
    policy: ReservationPolicy,
}

impl<S, C> CatalogService<S, C>
where
    S: DurableStore,
    C: CounterStore + ObjectCache,
{
    /// Creates a new catalog service.
    pub fn new(store: S, cache: C, policy: ReservationPolicy) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    /// Creates a product and warms its stock counter and detail entry.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        validate_details(
            &product.name,
            &product.description,
            &product.image_url,
            product.price.cents(),
        )?;
        if product.stock < 0 {
            return Err(InventoryError::InvalidArgument(
                "stock must not be negative".to_string(),
            ));
        }

        let product = self
            .policy
            .durable("create_product", self.store.create_product(product))
            .await?;

        self.write_counter(product.id, product.stock).await;
        self.write_detail(&product).await;

        metrics::counter!("products_created_total").increment(1);
        tracing::info!(product_id = %product.id, stock = product.stock, "product created");
        Ok(product)
    }

    /// Reads a product, serving from the detail cache when possible.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let key = detail_key(id);
        if let Some(Some(product)) = self
            .policy
            .cache("get_object", &key, self.cache.get_object::<Product>(&key))
            .await
        {
            metrics::counter!("product_cache_total", "result" => "hit").increment(1);
            return Ok(Some(product));
        }
        metrics::counter!("product_cache_total", "result" => "miss").increment(1);

        let product = self
            .policy
            .durable("get_product", self.store.get_product(id))
            .await?;
        if let Some(product) = &product {
            self.write_detail(product).await;
        }
        Ok(product)
    }

    /// Updates product details. Stock is left untouched; the counter is
    /// re-synced to the durable value.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        validate_details(
            &update.name,
            &update.description,
            &update.image_url,
            update.price.cents(),
        )?;

        let Some(product) = self
            .policy
            .durable("update_product", self.store.update_product(id, update))
            .await?
        else {
            return Ok(None);
        };

        self.write_counter(product.id, product.stock).await;
        self.write_detail(&product).await;

        tracing::info!("product updated");
        Ok(Some(product))
    }

    /// Deletes a product and its cache entries.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let deleted = self
            .policy
            .durable("delete_product", self.store.delete_product(id))
            .await?;

        if deleted {
            for key in [stock_key(id), detail_key(id)] {
                self.policy
                    .cache("delete", &key, self.cache.delete(&key))
                    .await;
            }
            tracing::info!("product deleted");
        }
        Ok(deleted)
    }

    /// Adds stock to a product.
    ///
    /// A warm counter is incremented by the same amount; a cold one stays
    /// cold.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, id: ProductId, quantity: i64) -> Result<Option<Product>> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidArgument(format!(
                "restock quantity must be positive, got {quantity}"
            )));
        }

        let increased = self
            .policy
            .durable("increase_stock", self.store.increase_stock(id, quantity))
            .await;
        let product = match increased {
            Ok(Some(product)) => product,
            Ok(None) => return Ok(None),
            Err(InventoryError::Durable(StoreError::OutOfRange(msg))) => {
                return Err(InventoryError::InvalidArgument(msg));
            }
            Err(e) => return Err(e),
        };

        let key = stock_key(id);
        self.policy
            .cache("increment_by", &key, self.cache.increment_by(&key, quantity))
            .await;
        let key = detail_key(id);
        self.policy
            .cache("delete", &key, self.cache.delete(&key))
            .await;

        metrics::counter!("products_restocked_total").increment(1);
        tracing::info!(quantity, stock = product.stock, "product restocked");
        Ok(Some(product))
    }

    /// Reloads the stock counter from the durable store.
    ///
    /// Returns the stock written, or `None` if the product does not exist.
    pub async fn sync_counter(&self, id: ProductId) -> Result<Option<i64>> {
        let Some(product) = self
            .policy
            .durable("get_product", self.store.get_product(id))
            .await?
        else {
            return Ok(None);
        };

        self.write_counter(id, product.stock).await;
        Ok(Some(product.stock))
    }

    async fn write_counter(&self, id: ProductId, stock: i64) {
        let key = stock_key(id);
        self.policy
            .cache("set_counter", &key, self.cache.set_counter(&key, stock))
            .await;
    }

    async fn write_detail(&self, product: &Product) {
        let key = detail_key(product.id);
        self.policy
            .cache(
                "set_object",
                &key,
                self.cache.set_object(&key, product, self.policy.detail_ttl),
            )
            .await;
    }
}

fn validate_details(name: &str, description: &str, image_url: &str, price_cents: i64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(InventoryError::InvalidArgument(
            "product name must not be empty".to_string(),
        ));
    }
    check_length("product name", name, PRODUCT_NAME_MAX)?;
    check_length("description", description, PRODUCT_DESCRIPTION_MAX)?;
    check_length("image url", image_url, PRODUCT_IMAGE_URL_MAX)?;
    if price_cents <= 0 {
        return Err(InventoryError::InvalidArgument(
            "price must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use storage::{InMemoryCache, InMemoryDurableStore};

    fn service() -> (
        CatalogService<InMemoryDurableStore, InMemoryCache>,
        InMemoryDurableStore,
        InMemoryCache,
    ) {
        let store = InMemoryDurableStore::new();
        let cache = InMemoryCache::new();
        let catalog = CatalogService::new(store.clone(), cache.clone(), ReservationPolicy::default());
        (catalog, store, cache)
    }

    fn widget(stock: i64) -> NewProduct {
        NewProduct {
            shop_id: 3,
            name: "Widget".to_string(),
            description: "Blue".to_string(),
            price: Money::from_cents(1299),
            stock,
            image_url: String::new(),
        }
    }

    fn rename(name: &str) -> ProductUpdate {
        ProductUpdate {
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(999),
            image_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_warms_cache() {
        let (catalog, _, cache) = service();

        let product = catalog.create_product(widget(7)).await.unwrap();

        assert_eq!(cache.get_counter(&stock_key(product.id)).await.unwrap(), Some(7));
        let cached: Product = cache
            .get_object(&detail_key(product.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, product);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (catalog, store, _) = service();

        let mut blank = widget(1);
        blank.name = "  ".to_string();
        let mut free = widget(1);
        free.price = Money::zero();

        let mut long_name = widget(1);
        long_name.name = "x".repeat(PRODUCT_NAME_MAX + 1);
        let mut long_image = widget(1);
        long_image.image_url = "x".repeat(PRODUCT_IMAGE_URL_MAX + 1);

        for product in [blank, free, widget(-1), long_name, long_image] {
            let result = catalog.create_product(product).await;
            assert!(matches!(result, Err(InventoryError::InvalidArgument(_))));
        }
        assert_eq!(store.stock_of(ProductId::new(1)), None);
    }

    #[tokio::test]
    async fn test_create_survives_cache_outage() {
        let (catalog, store, cache) = service();
        cache.set_unavailable(true);

        let product = catalog.create_product(widget(2)).await.unwrap();

        assert_eq!(store.stock_of(product.id), Some(2));
    }

    #[tokio::test]
    async fn test_get_product_is_cache_aside() {
        let (catalog, store, cache) = service();
        let product = store.create_product(widget(4)).await.unwrap();
        assert!(!cache.contains_key(&detail_key(product.id)));

        let loaded = catalog.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(loaded, product);
        assert!(cache.contains_key(&detail_key(product.id)));

        // Served from the cache even once the row is gone
        store.delete_product(product.id).await.unwrap();
        assert!(catalog.get_product(product.id).await.unwrap().is_some());

        assert!(catalog.get_product(ProductId::new(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_stock_and_refreshes_cache() {
        let (catalog, _, cache) = service();
        let product = catalog.create_product(widget(5)).await.unwrap();
        cache.set_counter(&stock_key(product.id), 1).await.unwrap();

        let updated = catalog
            .update_product(product.id, rename("Gizmo"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.stock, 5);
        assert_eq!(cache.get_counter(&stock_key(product.id)).await.unwrap(), Some(5));
        let cached = catalog.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(cached.name, "Gizmo");

        assert!(
            catalog
                .update_product(ProductId::new(99), rename("Nope"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_clears_cache() {
        let (catalog, _, cache) = service();
        let product = catalog.create_product(widget(5)).await.unwrap();

        assert!(catalog.delete_product(product.id).await.unwrap());
        assert!(cache.is_empty());
        assert!(!catalog.delete_product(product.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_restock_increments_warm_counter_only() {
        let (catalog, store, cache) = service();
        let warm = catalog.create_product(widget(1)).await.unwrap();
        let cold = store.create_product(widget(1)).await.unwrap();

        catalog.restock(warm.id, 4).await.unwrap().unwrap();
        catalog.restock(cold.id, 4).await.unwrap().unwrap();

        assert_eq!(cache.get_counter(&stock_key(warm.id)).await.unwrap(), Some(5));
        assert_eq!(cache.get_counter(&stock_key(cold.id)).await.unwrap(), None);
        assert!(!cache.contains_key(&detail_key(warm.id)));
        assert_eq!(store.stock_of(cold.id), Some(5));
    }

    #[tokio::test]
    async fn test_restock_rejects_non_positive_quantity() {
        let (catalog, _, _) = service();
        let product = catalog.create_product(widget(1)).await.unwrap();

        let result = catalog.restock(product.id, 0).await;
        assert!(matches!(result, Err(InventoryError::InvalidArgument(_))));
        assert!(catalog.restock(ProductId::new(99), 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restock_overflow_is_rejected() {
        let (catalog, store, cache) = service();
        let product = catalog.create_product(widget(5)).await.unwrap();

        let result = catalog.restock(product.id, i64::MAX).await;

        assert!(matches!(result, Err(InventoryError::InvalidArgument(_))));
        assert_eq!(store.stock_of(product.id), Some(5));
        assert_eq!(cache.get_counter(&stock_key(product.id)).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_update_rejects_oversized_description() {
        let (catalog, _, _) = service();
        let product = catalog.create_product(widget(5)).await.unwrap();
        let mut update = rename("Gizmo");
        update.description = "x".repeat(PRODUCT_DESCRIPTION_MAX + 1);

        let result = catalog.update_product(product.id, update).await;

        assert!(matches!(result, Err(InventoryError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_sync_counter_warms_cold_key() {
        let (catalog, store, cache) = service();
        let product = store.create_product(widget(6)).await.unwrap();

        assert_eq!(catalog.sync_counter(product.id).await.unwrap(), Some(6));
        assert_eq!(cache.get_counter(&stock_key(product.id)).await.unwrap(), Some(6));
        assert_eq!(catalog.sync_counter(ProductId::new(99)).await.unwrap(), None);
    }
}
