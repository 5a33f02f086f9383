use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::{CacheError, CacheResult, CounterStore, DecrementOutcome, ObjectCache};

// Status codes returned by the scripts below.
const MISSING: i64 = 0;
const REJECTED: i64 = 1;
const APPLIED: i64 = 2;
const WRONG_TYPE: i64 = 3;

const DECREMENT_WITH_FLOOR: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return {0, 0}
end
if string.find(raw, '^-?%d+$') == nil then
    return {3, 0}
end
local current = tonumber(raw)
local amount = tonumber(ARGV[1])
if current < amount then
    return {1, current}
end
return {2, redis.call('DECRBY', KEYS[1], amount)}
"#;

const INCREMENT_EXISTING: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return {0, 0}
end
if string.find(raw, '^-?%d+$') == nil then
    return {3, 0}
end
return {2, redis.call('INCRBY', KEYS[1], ARGV[1])}
"#;

/// Counter store and object cache backed by Redis.
///
/// Check-and-decrement and guarded increments run as Lua scripts, so each is
/// a single step on the server and every API process sharing the server
/// sees the same counters.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    decrement_with_floor: Script,
    increment_existing: Script,
}

impl RedisCounterStore {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            decrement_with_floor: Script::new(DECREMENT_WITH_FLOOR),
            increment_existing: Script::new(INCREMENT_EXISTING),
        })
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::WrongType {
        key: key.to_string(),
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn decrement_with_floor(&self, key: &str, amount: i64) -> CacheResult<DecrementOutcome> {
        let mut conn = self.conn.clone();
        let (status, value): (i64, i64) = self
            .decrement_with_floor
            .key(key)
            .arg(amount)
            .invoke_async(&mut conn)
            .await?;

        match status {
            MISSING => Ok(DecrementOutcome::Missing),
            REJECTED => Ok(DecrementOutcome::Rejected { current: value }),
            APPLIED => Ok(DecrementOutcome::Applied { remaining: value }),
            WRONG_TYPE => Err(wrong_type(key)),
            other => Err(CacheError::Unavailable(format!(
                "unexpected script status {other} for {key}"
            ))),
        }
    }

    async fn increment_by(&self, key: &str, amount: i64) -> CacheResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let (status, value): (i64, i64) = self
            .increment_existing
            .key(key)
            .arg(amount)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                // INCRBY refuses to leave the i64 range
                if e.to_string().contains("overflow") {
                    CacheError::Overflow {
                        key: key.to_string(),
                    }
                } else {
                    CacheError::Redis(e)
                }
            })?;

        match status {
            MISSING => Ok(None),
            APPLIED => Ok(Some(value)),
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_counter(&self, key: &str, value: i64) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let () = conn.set(key, value).await?;
        Ok(())
    }

    async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| wrong_type(key)),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl ObjectCache for RedisCounterStore {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        // EX takes whole seconds; a zero TTL is rejected by the server
        let seconds = ttl.as_secs().max(1);
        let () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }
}
