//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon,
//! so they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p storage --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use common::{
    Money, NewProduct, Order, OrderId, OrderItem, OrderStatus, ProductId, ProductUpdate,
    ShippingInfo, UserId,
};
use serial_test::serial;
use sqlx::PgPool;
use storage::{DurableStore, DurableTransaction, PostgresDurableStore, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresDurableStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, products RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDurableStore::new(pool)
}

fn new_product(stock: i64) -> NewProduct {
    NewProduct {
        shop_id: 1,
        name: "Widget".to_string(),
        description: "A widget".to_string(),
        price: Money::from_cents(1999),
        stock,
        image_url: "https://img/widget.png".to_string(),
    }
}

fn order_for(items: Vec<OrderItem>) -> Order {
    let total = Money::checked_sum(items.iter().map(|i| i.subtotal)).unwrap();
    Order {
        id: OrderId::new(),
        user_id: UserId::new(7),
        status: OrderStatus::Pending,
        items,
        total_amount: total,
        discount_amount: Money::zero(),
        shipping_fee: Money::zero(),
        actual_amount: total,
        shipping: ShippingInfo {
            name: "Ada".to_string(),
            phone: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            zip_code: "12345".to_string(),
        },
        // Postgres stores microseconds
        created_at: Utc::now().trunc_subsecs(6),
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn create_and_get_product() {
    let store = get_test_store().await;

    let product = store.create_product(new_product(10)).await.unwrap();
    let loaded = store.get_product(product.id).await.unwrap().unwrap();

    assert_eq!(loaded.name, "Widget");
    assert_eq!(loaded.price, Money::from_cents(1999));
    assert_eq!(loaded.stock, 10);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn negative_initial_stock_is_rejected() {
    let store = get_test_store().await;

    let result = store.create_product(new_product(-1)).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn conditional_decrement_stops_at_zero() {
    let store = get_test_store().await;
    let product = store.create_product(new_product(5)).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.decrement_stock(product.id, 3).await.unwrap(), 1);
    assert_eq!(tx.decrement_stock(product.id, 3).await.unwrap(), 0);
    assert_eq!(tx.decrement_stock(ProductId::new(404), 1).await.unwrap(), 0);
    tx.commit().await.unwrap();

    let loaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(loaded.stock, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn rollback_discards_decrements_and_orders() {
    let store = get_test_store().await;
    let product = store.create_product(new_product(10)).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.decrement_stock(product.id, 4).await.unwrap();
    let snapshot = tx.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(snapshot.stock, 6);

    let order = order_for(vec![OrderItem::from_snapshot(&snapshot, 4).unwrap()]);
    tx.create_order_with_items(&order).await.unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 10);
    assert!(store.get_order(order.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn committed_order_roundtrips_with_items_in_order() {
    let store = get_test_store().await;
    let a = store.create_product(new_product(10)).await.unwrap();
    let b = store.create_product(new_product(10)).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.decrement_stock(b.id, 1).await.unwrap();
    tx.decrement_stock(a.id, 2).await.unwrap();
    let order = order_for(vec![
        OrderItem::from_snapshot(&b, 1).unwrap(),
        OrderItem::from_snapshot(&a, 2).unwrap(),
    ]);
    tx.create_order_with_items(&order).await.unwrap();
    tx.commit().await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded, order);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn concurrent_decrements_never_oversell() {
    let store = get_test_store().await;
    let product = store.create_product(new_product(10)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..25 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await.unwrap();
            let rows = tx.decrement_stock(product.id, 1).await.unwrap();
            tx.commit().await.unwrap();
            rows
        }));
    }

    let mut granted = 0;
    for handle in handles {
        granted += handle.await.unwrap();
    }

    assert_eq!(granted, 10);
    assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn update_and_restock() {
    let store = get_test_store().await;
    let product = store.create_product(new_product(3)).await.unwrap();

    let updated = store
        .update_product(
            product.id,
            ProductUpdate {
                name: "Gadget".to_string(),
                description: String::new(),
                price: Money::from_cents(2500),
                image_url: String::new(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Gadget");
    assert_eq!(updated.stock, 3);

    let restocked = store.increase_stock(product.id, 7).await.unwrap().unwrap();
    assert_eq!(restocked.stock, 10);

    assert!(store.delete_product(product.id).await.unwrap());
    assert!(!store.delete_product(product.id).await.unwrap());
    assert!(store.increase_stock(product.id, 1).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn restock_overflow_is_out_of_range() {
    let store = get_test_store().await;
    let product = store.create_product(new_product(5)).await.unwrap();

    let result = store.increase_stock(product.id, i64::MAX).await;

    assert!(matches!(result, Err(StoreError::OutOfRange(_))));
    assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn order_status_moves_only_from_expected_status() {
    let store = get_test_store().await;
    let product = store.create_product(new_product(5)).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.decrement_stock(product.id, 2).await.unwrap();
    let order = order_for(vec![OrderItem::from_snapshot(&product, 2).unwrap()]);
    tx.create_order_with_items(&order).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(
        tx.update_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap()
    );
    assert!(
        !tx.update_order_status(order.id, OrderStatus::Pending, OrderStatus::Paid)
            .await
            .unwrap()
    );
    assert_eq!(tx.increase_stock(product.id, 2).await.unwrap(), 1);
    let seen = tx.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(seen.status, OrderStatus::Cancelled);
    tx.commit().await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Cancelled);
    assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);
}
