//! Redis integration tests
//!
//! These tests use a shared Redis container and need a Docker daemon, so they
//! are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p storage --test redis_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use storage::{
    CacheError, CounterStore, DecrementOutcome, ObjectCache, ObjectCacheExt, RedisCounterStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::{REDIS_PORT, Redis};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Redis>,
    url: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Redis::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(REDIS_PORT).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                url: format!("redis://{}:{}", host, port),
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> RedisCounterStore {
    let info = get_container_info().await;
    RedisCounterStore::connect(&info.url).await.unwrap()
}

/// Keys are unique per test so the shared server needs no flushing.
fn unique_key(prefix: &str) -> String {
    format!("{prefix}:{}", Uuid::new_v4())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn decrement_with_floor_on_missing_key() {
    let store = get_test_store().await;
    let key = unique_key("stock");

    let outcome = store.decrement_with_floor(&key, 3).await.unwrap();

    assert_eq!(outcome, DecrementOutcome::Missing);
    assert_eq!(store.get_counter(&key).await.unwrap(), None);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn decrement_with_floor_applies_then_rejects() {
    let store = get_test_store().await;
    let key = unique_key("stock");
    store.set_counter(&key, 5).await.unwrap();

    let outcome = store.decrement_with_floor(&key, 3).await.unwrap();
    assert_eq!(outcome, DecrementOutcome::Applied { remaining: 2 });

    let outcome = store.decrement_with_floor(&key, 3).await.unwrap();
    assert_eq!(outcome, DecrementOutcome::Rejected { current: 2 });
    assert_eq!(store.get_counter(&key).await.unwrap(), Some(2));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn increment_by_leaves_missing_key_absent() {
    let store = get_test_store().await;
    let key = unique_key("stock");

    assert_eq!(store.increment_by(&key, 4).await.unwrap(), None);
    assert_eq!(store.get_counter(&key).await.unwrap(), None);

    store.set_counter(&key, 1).await.unwrap();
    assert_eq!(store.increment_by(&key, 4).await.unwrap(), Some(5));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn increment_overflow_is_reported() {
    let store = get_test_store().await;
    let key = unique_key("stock");
    store.set_counter(&key, 5).await.unwrap();

    let result = store.increment_by(&key, i64::MAX).await;

    assert!(matches!(result, Err(CacheError::Overflow { .. })));
    assert_eq!(store.get_counter(&key).await.unwrap(), Some(5));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn counters_refuse_object_entries() {
    let store = get_test_store().await;
    let key = unique_key("product");
    store
        .set_raw(&key, r#"{"id":1}"#.to_string(), Duration::from_secs(60))
        .await
        .unwrap();

    assert!(matches!(
        store.decrement_with_floor(&key, 1).await,
        Err(CacheError::WrongType { .. })
    ));
    assert!(matches!(
        store.increment_by(&key, 1).await,
        Err(CacheError::WrongType { .. })
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn concurrent_decrements_across_connections_never_oversell() {
    let key = unique_key("stock");
    get_test_store().await.set_counter(&key, 10).await.unwrap();

    // One connection per task, as separate API processes would have
    let mut handles = Vec::new();
    for _ in 0..25 {
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let store = get_test_store().await;
            store.decrement_with_floor(&key, 1).await.unwrap()
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), DecrementOutcome::Applied { .. }) {
            applied += 1;
        }
    }

    assert_eq!(applied, 10);
    assert_eq!(
        get_test_store().await.get_counter(&key).await.unwrap(),
        Some(0)
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn objects_round_trip_and_delete() {
    let store = get_test_store().await;
    let key = unique_key("product");

    store
        .set_object(&key, &vec![1, 2, 3], Duration::from_secs(60))
        .await
        .unwrap();
    let cached: Option<Vec<i32>> = store.get_object(&key).await.unwrap();
    assert_eq!(cached, Some(vec![1, 2, 3]));

    assert!(store.delete(&key).await.unwrap());
    assert!(!store.delete(&key).await.unwrap());
    let gone: Option<Vec<i32>> = store.get_object(&key).await.unwrap();
    assert_eq!(gone, None);
}
