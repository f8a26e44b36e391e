use async_trait::async_trait;
use common::{OrderId, OrderItem, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{
    InventoryReservation, Product, ReservationEngine, ReservationOutcome, ReservationStatus,
    reservable_lines,
};
use crate::error::Result;

const UNIQUE_RESERVATION: &str = "uq_reservation_order_product";

/// PostgreSQL-backed reservation engine.
///
/// Each attempt is one transaction that locks the order's product rows with
/// `SELECT ... FOR UPDATE` in ascending id order.
#[derive(Clone)]
pub struct PostgresReservationEngine {
    pool: PgPool,
}

impl PostgresReservationEngine {
    /// Creates a new engine over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the inventory service migrations, including the seed menu.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations/inventory")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            price_cents: row.try_get("price_cents")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_reservation(row: PgRow) -> Result<InventoryReservation> {
        let status: String = row.try_get("status")?;
        Ok(InventoryReservation {
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ReservationEngine for PostgresReservationEngine {
    #[tracing::instrument(skip_all, fields(order_id = %order_id, lines = items.len()))]
    async fn check_and_reserve(
        &self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<ReservationOutcome> {
        let lines = reservable_lines(items)?;
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_reservations WHERE order_id = $1")
                .bind(order_id.as_i64())
                .fetch_one(&mut *tx)
                .await?;
        if existing > 0 {
            tracing::info!("Order already holds reservations");
            return Ok(ReservationOutcome::Accepted);
        }

        for (product_id, requested) in lines {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1 FOR UPDATE")
                    .bind(product_id.as_i64())
                    .fetch_optional(&mut *tx)
                    .await?;

            let outcome = match available {
                None => Some(ReservationOutcome::product_not_found(product_id)),
                Some(available) if available < requested => Some(
                    ReservationOutcome::insufficient(product_id, requested, available),
                ),
                Some(_) => None,
            };
            if let Some(rejected) = outcome {
                tx.rollback().await?;
                return Ok(rejected);
            }

            sqlx::query(
                "UPDATE products SET quantity = quantity - $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(requested)
            .bind(product_id.as_i64())
            .execute(&mut *tx)
            .await?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO inventory_reservations (order_id, product_id, quantity, status)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order_id.as_i64())
            .bind(product_id.as_i64())
            .bind(requested)
            .bind(ReservationStatus::Reserved.as_str())
            .execute(&mut *tx)
            .await;

            if let Err(sqlx::Error::Database(ref db_err)) = inserted
                && db_err.constraint() == Some(UNIQUE_RESERVATION)
            {
                // A concurrent delivery of the same order won the race.
                tx.rollback().await?;
                return Ok(ReservationOutcome::Accepted);
            }
            inserted?;
        }

        tx.commit().await?;
        Ok(ReservationOutcome::Accepted)
    }

    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    async fn confirm(&self, order_id: OrderId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_reservations
            SET status = $1, updated_at = NOW()
            WHERE order_id = $2 AND status = $3
            "#,
        )
        .bind(ReservationStatus::Confirmed.as_str())
        .bind(order_id.as_i64())
        .bind(ReservationStatus::Reserved.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    async fn release(&self, order_id: OrderId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            UPDATE inventory_reservations
            SET status = $1, updated_at = NOW()
            WHERE order_id = $2 AND status = $3
            RETURNING product_id, quantity
            "#,
        )
        .bind(ReservationStatus::Released.as_str())
        .bind(order_id.as_i64())
        .bind(ReservationStatus::Reserved.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let mut returned: Vec<(i64, i64)> = rows
            .iter()
            .map(|row| -> Result<(i64, i64)> {
                Ok((row.try_get("product_id")?, row.try_get("quantity")?))
            })
            .collect::<Result<_>>()?;
        returned.sort_unstable();

        for (product_id, quantity) in &returned {
            sqlx::query(
                "UPDATE products SET quantity = quantity + $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(*quantity)
            .bind(*product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(returned.len() as u64)
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        sqlx::query("SELECT id, name, quantity, price_cents, updated_at FROM products WHERE id = $1")
            .bind(product_id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_product)
            .transpose()
    }

    async fn reservations(&self, order_id: OrderId) -> Result<Vec<InventoryReservation>> {
        sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, status, created_at, updated_at
            FROM inventory_reservations
            WHERE order_id = $1
            ORDER BY product_id ASC
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Self::row_to_reservation)
        .collect()
    }
}
