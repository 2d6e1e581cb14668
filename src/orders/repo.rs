use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Order, OrderStatus};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_status_created_before(
        &self,
        statuses: &[OrderStatus],
        before: OffsetDateTime,
    ) -> anyhow::Result<Vec<Order>>;

    /// Moves the order to `to` only while it is still `expected`.
    /// Returns false when another writer got there first.
    async fn transition_if_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    /// Consumption history, oldest first.
    async fn completed_orders(&self) -> anyhow::Result<Vec<Order>>;
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    cafe_slug: String,
    user_id: Uuid,
    items: Json<Vec<String>>,
    status: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(r: OrderRow) -> anyhow::Result<Self> {
        let status = r
            .status
            .parse::<OrderStatus>()
            .with_context(|| format!("order {}", r.id))?;
        Ok(Self {
            id: r.id,
            cafe_slug: r.cafe_slug,
            user_id: r.user_id,
            items: r.items.0,
            status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgOrders {
    db: PgPool,
}

impl PgOrders {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderStore for PgOrders {
    async fn find_by_status_created_before(
        &self,
        statuses: &[OrderStatus],
        before: OffsetDateTime,
    ) -> anyhow::Result<Vec<Order>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, cafe_slug, user_id, items, status, created_at, updated_at
              FROM orders
             WHERE status = ANY($1)
               AND created_at < $2
             ORDER BY created_at ASC
            "#,
        )
        .bind(statuses)
        .bind(before)
        .fetch_all(&self.db)
        .await
        .context("find stale orders")?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn transition_if_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE orders
               SET status = $3, updated_at = $4
             WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(to.as_str())
        .bind(updated_at)
        .execute(&self.db)
        .await
        .with_context(|| format!("update order {}", id))?;

        Ok(res.rows_affected() > 0)
    }

    async fn completed_orders(&self) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, cafe_slug, user_id, items, status, created_at, updated_at
              FROM orders
             WHERE status = 'COMPLETED'
             ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list completed orders")?;

        rows.into_iter().map(Order::try_from).collect()
    }
}
