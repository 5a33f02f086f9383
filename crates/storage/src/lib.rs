//! Storage adapters for the checkout path.
//!
//! Two stores are involved in every stock reservation:
//! - the durable store (`DurableStore`), the relational system of record for
//!   product stock and orders, with a PostgreSQL and an in-memory backend;
//! - the fast-path counter store (`CounterStore`), a key-value mirror of stock
//!   used to reject overdrawn requests cheaply, with a Redis and an in-memory
//!   backend. The same keyspace serves as the product-detail object cache
//!   (`ObjectCache`).

pub mod counter;
pub mod durable;
pub mod error;
pub mod memory;
pub mod memory_cache;
pub mod object_cache;
pub mod postgres;
pub mod redis_cache;

pub use counter::{CounterStore, DecrementOutcome};
pub use durable::{DurableStore, DurableTransaction};
pub use error::{CacheError, CacheResult, Result, StoreError};
pub use memory::{InMemoryDurableStore, InMemoryTransaction};
pub use memory_cache::InMemoryCache;
pub use object_cache::{ObjectCache, ObjectCacheExt};
pub use postgres::{PostgresDurableStore, PostgresTransaction};
pub use redis_cache::RedisCounterStore;
