use thiserror::Error;

/// Errors that can occur when interacting with the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write collided with an existing row.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored row could not be mapped back into a model.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A stock or quantity update would leave the representable range.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// The store refused the operation (connection lost, injected fault).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for durable store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors reported by the counter store / object cache.
///
/// Callers on the checkout path absorb these: the cache is never
/// authoritative.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache could not be reached.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// The key holds a value of a different kind (object vs counter).
    #[error("Key {key} holds the wrong kind of value")]
    WrongType { key: String },

    /// A counter update would overflow.
    #[error("Counter {key} would overflow")]
    Overflow { key: String },

    /// The Redis server or connection reported an error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A cached object could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
