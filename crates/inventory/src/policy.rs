//! Timeouts and cache lifetimes for store calls.

use std::future::Future;
use std::time::Duration;

use storage::CacheResult;

use crate::{InventoryError, Result};

/// Bounds applied to every store call made by the inventory services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// Upper bound for a single counter store call. Exceeding it counts as a
    /// cache miss.
    pub counter_timeout: Duration,
    /// Upper bound for a single durable store call.
    pub durable_timeout: Duration,
    /// Lifetime of a cached product-detail entry.
    pub detail_ttl: Duration,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            counter_timeout: Duration::from_millis(50),
            durable_timeout: Duration::from_secs(5),
            detail_ttl: Duration::from_secs(300),
        }
    }
}

impl ReservationPolicy {
    pub fn with_counter_timeout(mut self, timeout: Duration) -> Self {
        self.counter_timeout = timeout;
        self
    }

    pub fn with_durable_timeout(mut self, timeout: Duration) -> Self {
        self.durable_timeout = timeout;
        self
    }

    pub fn with_detail_ttl(mut self, ttl: Duration) -> Self {
        self.detail_ttl = ttl;
        self
    }

    /// Runs a durable store call under `durable_timeout`.
    pub async fn durable<F, T>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = storage::Result<T>>,
    {
        match tokio::time::timeout(self.durable_timeout, call).await {
            Ok(result) => result.map_err(InventoryError::from),
            Err(_) => {
                tracing::warn!(operation, "durable store call timed out");
                Err(InventoryError::DurableTimeout { operation })
            }
        }
    }

    /// Runs a counter or cache call under `counter_timeout`.
    ///
    /// Failures and timeouts are logged and come back as `None`; callers
    /// treat them like a miss.
    pub async fn cache<F, T>(&self, operation: &'static str, key: &str, call: F) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        match tokio::time::timeout(self.counter_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(operation, key, error = %e, "cache call failed");
                None
            }
            Err(_) => {
                tracing::warn!(operation, key, "cache call timed out");
                None
            }
        }
    }
}
