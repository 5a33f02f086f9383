use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheResult;

/// Cache of serialized objects with a time-to-live.
///
/// Objects share the keyspace of the counter store; they are removed with
/// `CounterStore::delete`.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Reads the raw serialized value stored under `key`.
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores a raw serialized value that expires after `ttl`.
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;
}

/// JSON helpers on top of any object cache.
#[async_trait]
pub trait ObjectCacheExt: ObjectCache {
    /// Reads and decodes a JSON object.
    async fn get_object<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encodes and stores a JSON object.
    async fn set_object<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, raw, ttl).await
    }
}

// Blanket implementation for all ObjectCache implementations
impl<T: ObjectCache + ?Sized> ObjectCacheExt for T {}
