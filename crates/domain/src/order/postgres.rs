use async_trait::async_trait;
use common::{OrderId, OrderItem, ProductId};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use super::{NewOrder, Order, OrderRepository, OrderStatus, StatusChange};
use crate::error::{DomainError, Result};

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new repository over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the order service migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations/order")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        let quantity: i64 = row.try_get("quantity")?;
        Ok(OrderItem {
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: u32::try_from(quantity)
                .map_err(|_| DomainError::Corrupt(format!("item quantity {quantity}")))?,
            name: row.try_get("name")?,
            unit_price_cents: row.try_get("price_cents")?,
        })
    }

    async fn fetch(conn: &mut PgConnection, id: OrderId, for_update: bool) -> Result<Option<Order>> {
        let sql = if for_update {
            r#"
            SELECT id, customer_id, delivery_address, status, created_at, updated_at, version
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, customer_id, delivery_address, status, created_at, updated_at, version
            FROM orders
            WHERE id = $1
            "#
        };

        let Some(row) = sqlx::query(sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query(
            r#"
            SELECT product_id, quantity, name, price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Self::row_to_item)
        .collect::<Result<Vec<_>>>()?;

        let status: String = row.try_get("status")?;
        Ok(Some(Order {
            id: OrderId::new(row.try_get("id")?),
            customer_id: row.try_get("customer_id")?,
            delivery_address: row.try_get("delivery_address")?,
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            items,
        }))
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[tracing::instrument(skip_all, fields(customer_id = %order.customer_id))]
    async fn create(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_id, delivery_address, status)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, updated_at, version
            "#,
        )
        .bind(&order.customer_id)
        .bind(&order.delivery_address)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let id = OrderId::new(row.try_get("id")?);

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, name, price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id.as_i64())
            .bind(i32::try_from(position).map_err(|_| {
                DomainError::Corrupt(format!("line position {position} does not fit a column"))
            })?)
            .bind(item.product_id.as_i64())
            .bind(i64::from(item.quantity))
            .bind(&item.name)
            .bind(item.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(order_id = %id, "Order stored");

        Ok(Order {
            id,
            customer_id: order.customer_id,
            delivery_address: order.delivery_address,
            status: OrderStatus::Pending,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            items: order.items,
        })
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut *conn, id, false).await
    }

    #[tracing::instrument(skip_all, fields(order_id = %id, target = %target))]
    async fn advance_status(
        &self,
        id: OrderId,
        target: OrderStatus,
    ) -> Result<(Order, StatusChange)> {
        let mut tx = self.pool.begin().await?;

        let mut order = Self::fetch(&mut *tx, id, true)
            .await?
            .ok_or(DomainError::OrderNotFound(id))?;

        let change = order.status.transition_to(target);
        if change.is_advanced() {
            let row = sqlx::query(
                r#"
                UPDATE orders
                SET status = $1, version = version + 1, updated_at = NOW()
                WHERE id = $2 AND version = $3
                RETURNING version, updated_at
                "#,
            )
            .bind(target.as_str())
            .bind(id.as_i64())
            .bind(order.version)
            .fetch_one(&mut *tx)
            .await?;

            order.status = target;
            order.version = row.try_get("version")?;
            order.updated_at = row.try_get("updated_at")?;
        }

        tx.commit().await?;
        Ok((order, change))
    }
}
