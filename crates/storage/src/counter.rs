use async_trait::async_trait;

use crate::CacheResult;

/// Result of an atomic check-and-decrement on a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// The key does not exist (cold cache).
    Missing,
    /// The counter is below the requested amount; nothing was changed.
    Rejected { current: i64 },
    /// The counter was decremented.
    Applied { remaining: i64 },
}

/// Key-value counter store mirroring product stock.
///
/// Every mutation is a single indivisible operation on the server side;
/// callers never read a value and write it back.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically decrements `key` by `amount` if the counter is at least
    /// `amount`.
    ///
    /// The read, the floor check and the write are not observable as
    /// separate steps by concurrent callers.
    async fn decrement_with_floor(&self, key: &str, amount: i64) -> CacheResult<DecrementOutcome>;

    /// Atomically increments an existing counter by `amount`.
    ///
    /// Returns the new value, or `None` if the key does not exist. An absent
    /// key is left absent.
    async fn increment_by(&self, key: &str, amount: i64) -> CacheResult<Option<i64>>;

    /// Sets a counter, replacing whatever the key held.
    async fn set_counter(&self, key: &str, value: i64) -> CacheResult<()>;

    /// Reads a counter.
    async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>>;

    /// Deletes a key of any kind. Returns true if it existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;
}
