//! Delivery slot reads and the guarded counter update.

use async_trait::async_trait;
use uuid::Uuid;

use super::SlotRepository;
use crate::{models::DeliverySlot, DbError, DbPool};

const SLOT_COLUMNS: &str = "id, date, time_start, time_end, max_orders, orders_count, version";

/// Postgres-backed [`SlotRepository`].
#[derive(Clone)]
pub struct PgSlotRepository {
    pool: DbPool,
}

impl PgSlotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotRepository for PgSlotRepository {
    async fn get_slot(&self, id: Uuid) -> Result<Option<DeliverySlot>, DbError> {
        let row = sqlx::query_as::<_, DeliverySlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM delivery_slots WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_slots(&self) -> Result<Vec<DeliverySlot>, DbError> {
        let rows = sqlx::query_as::<_, DeliverySlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM delivery_slots ORDER BY date ASC, time_start ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn compare_and_set_orders(
        &self,
        id: Uuid,
        expected_version: i64,
        new_count: i32,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE delivery_slots
            SET orders_count = $3, version = version + 1
            WHERE id = $1 AND version = $2 AND $3 >= 0 AND $3 <= max_orders
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(new_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
