use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{CacheError, CacheResult, CounterStore, DecrementOutcome, ObjectCache};

#[derive(Debug, Clone)]
enum Value {
    Counter(i64),
    Object(String),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    unavailable: bool,
    latency: Duration,
    operations: u64,
}

impl CacheState {
    /// Returns the live entry for `key`, evicting it if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

/// In-memory counter store and object cache.
///
/// Each operation runs under a single lock, which gives it the same
/// atomicity as the scripts of [`RedisCounterStore`](crate::RedisCounterStore).
/// The mirror is local to the process. Faults and latency can be injected
/// for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    state: Arc<Mutex<CacheState>>,
}

impl InMemoryCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `CacheError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Delays every subsequent operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Returns the number of operations attempted so far.
    pub fn operation_count(&self) -> u64 {
        self.lock().operations
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .entries
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` holds a live value of any kind.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().live(key).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call, applies injected latency and fails if unavailable.
    async fn enter(&self) -> CacheResult<()> {
        let latency = {
            let mut state = self.lock();
            state.operations += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.lock().unavailable {
            return Err(CacheError::Unavailable("cache is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for InMemoryCache {
    async fn decrement_with_floor(&self, key: &str, amount: i64) -> CacheResult<DecrementOutcome> {
        self.enter().await?;
        let mut state = self.lock();

        let Some(entry) = state.live(key) else {
            return Ok(DecrementOutcome::Missing);
        };
        match &mut entry.value {
            Value::Counter(current) if *current < amount => Ok(DecrementOutcome::Rejected {
                current: *current,
            }),
            Value::Counter(current) => {
                *current -= amount;
                Ok(DecrementOutcome::Applied {
                    remaining: *current,
                })
            }
            Value::Object(_) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn increment_by(&self, key: &str, amount: i64) -> CacheResult<Option<i64>> {
        self.enter().await?;
        let mut state = self.lock();

        let Some(entry) = state.live(key) else {
            return Ok(None);
        };
        match &mut entry.value {
            Value::Counter(current) => {
                *current = current.checked_add(amount).ok_or_else(|| CacheError::Overflow {
                    key: key.to_string(),
                })?;
                Ok(Some(*current))
            }
            Value::Object(_) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn set_counter(&self, key: &str, value: i64) -> CacheResult<()> {
        self.enter().await?;
        self.lock().entries.insert(
            key.to_string(),
            Entry {
                value: Value::Counter(value),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>> {
        self.enter().await?;
        let mut state = self.lock();
        match state.live(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Counter(current)) => Ok(Some(*current)),
            Some(Value::Object(_)) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.enter().await?;
        let mut state = self.lock();
        let existed = state.live(key).is_some();
        state.entries.remove(key);
        Ok(existed)
    }
}

#[async_trait]
impl ObjectCache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        self.enter().await?;
        let mut state = self.lock();
        match state.live(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Object(raw)) => Ok(Some(raw.clone())),
            Some(Value::Counter(_)) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.enter().await?;
        self.lock().entries.insert(
            key.to_string(),
            Entry {
                value: Value::Object(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }
}
