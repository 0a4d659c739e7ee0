use chrono::{DateTime, Utc};
use ration_core::domain::cart::Item;
use ration_core::domain::order::{Order, OrderId};
use sqlx::{sqlite::SqliteRow, Row};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let items_json = serde_json::to_string(&order.items)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;
        let item_count = i64::try_from(order.items.len())
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, session_id, item_count, items_json, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(&order.session_id)
        .bind(item_count)
        .bind(items_json)
        .bind(order.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT order_id, session_id, items_json, created_at FROM orders WHERE order_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| order_from_row(&row)).transpose()
    }
}

fn order_from_row(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let items_json: String = row.try_get("items_json")?;
    let created_at: String = row.try_get("created_at")?;

    let items: Vec<Item> = serde_json::from_str(&items_json)
        .map_err(|error| RepositoryError::Decode(format!("orders.items_json: {error}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("orders.created_at: {error}")))?;

    Ok(Order {
        order_id: OrderId(row.try_get("order_id")?),
        session_id: row.try_get("session_id")?,
        items,
        created_at,
    })
}
