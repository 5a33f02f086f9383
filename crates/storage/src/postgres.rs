use async_trait::async_trait;
use common::{
    Money, NewProduct, Order, OrderId, OrderItem, OrderStatus, Product, ProductId, ProductUpdate,
    ShippingInfo, UserId,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use crate::{DurableStore, DurableTransaction, Result, StoreError};

const PRODUCT_COLUMNS: &str =
    "id, shop_id, name, description, price_cents, stock, image_url, created_at, updated_at";

/// PostgreSQL-backed durable store.
#[derive(Clone)]
pub struct PostgresDurableStore {
    pool: PgPool,
}

impl PostgresDurableStore {
    /// Creates a new PostgreSQL durable store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        shop_id: row.try_get("shop_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: row.try_get("stock")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        product_image: row.try_get("product_image")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        quantity: row.try_get("quantity")?,
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

fn row_to_order(row: PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status)
        .ok_or_else(|| StoreError::InvalidRow(format!("unknown order status {status:?}")))?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        status,
        items,
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        discount_amount: Money::from_cents(row.try_get("discount_cents")?),
        shipping_fee: Money::from_cents(row.try_get("shipping_fee_cents")?),
        actual_amount: Money::from_cents(row.try_get("actual_cents")?),
        shipping: ShippingInfo {
            name: row.try_get("shipping_name")?,
            phone: row.try_get("shipping_phone")?,
            address: row.try_get("shipping_address")?,
            zip_code: row.try_get("shipping_zip_code")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_product(conn: &mut PgConnection, id: ProductId) -> Result<Option<Product>> {
    let row = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id.as_i64())
    .fetch_optional(conn)
    .await?;

    row.map(row_to_product).transpose()
}

async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
    let row: Option<PgRow> = sqlx::query(
        r#"
        SELECT id, user_id, status, total_cents, discount_cents, shipping_fee_cents,
               actual_cents, shipping_name, shipping_phone, shipping_address,
               shipping_zip_code, created_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = sqlx::query(
        r#"
        SELECT product_id, product_name, product_image, unit_price_cents, quantity,
               subtotal_cents
        FROM order_items
        WHERE order_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(row_to_item)
    .collect::<Result<Vec<_>>>()?;

    row_to_order(row, items).map(Some)
}

/// Maps a `numeric_value_out_of_range` error from a stock update.
fn stock_update_error(e: sqlx::Error, id: ProductId) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.code().as_deref() == Some("22003")
    {
        return StoreError::OutOfRange(format!("stock of product {id} would overflow"));
    }
    StoreError::Database(e)
}

#[async_trait]
impl DurableStore for PostgresDurableStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (shop_id, name, description, price_cents, stock, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.shop_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(&product.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("products_stock_non_negative")
            {
                return StoreError::Conflict("stock must be non-negative".to_string());
            }
            StoreError::Database(e)
        })?;

        row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, image_url = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price.cents())
        .bind(&update.image_url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increase_stock(&self, id: ProductId, quantity: i64) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| stock_update_error(e, id))?;

        row.map(row_to_product).transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }
}

/// Transaction handle for [`PostgresDurableStore`].
///
/// Wraps a sqlx transaction; dropping it without committing rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl DurableTransaction for PostgresTransaction {
    async fn decrement_stock(&mut self, id: ProductId, quantity: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            "#,
        )
        .bind(id.as_i64())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn increase_stock(&mut self, id: ProductId, quantity: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| stock_update_error(e, id))?;

        Ok(result.rows_affected())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        fetch_product(&mut self.tx, id).await
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        fetch_order(&mut self.tx, id).await
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_uuid())
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_order_with_items(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total_cents, discount_cents,
                                shipping_fee_cents, actual_cents, shipping_name, shipping_phone,
                                shipping_address, shipping_zip_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_i64())
        .bind(order.status.as_str())
        .bind(order.total_amount.cents())
        .bind(order.discount_amount.cents())
        .bind(order.shipping_fee.cents())
        .bind(order.actual_amount.cents())
        .bind(&order.shipping.name)
        .bind(&order.shipping.phone)
        .bind(&order.shipping.address)
        .bind(&order.shipping.zip_code)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            // A primary key violation means the order id was already used
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::Conflict(format!("order {} already exists", order.id));
            }
            StoreError::Database(e)
        })?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, product_name,
                                         product_image, unit_price_cents, quantity, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(&item.product_image)
            .bind(item.unit_price.cents())
            .bind(item.quantity)
            .bind(item.subtotal.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
