//! Flow execution persistence.
//!
//! The "one open execution per phone" rule is enforced by a partial unique
//! index on `flow_executions (phone) WHERE status IN ('active', 'handover')`;
//! a violation surfaces as `DbError::Conflict`.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::ExecutionRepository;
use crate::{models::ExecutionRow, DbError, DbPool};

const EXECUTION_COLUMNS: &str = "id, flow_id, phone, current_node_id, status, context, \
     started_at, completed_at, paused_at";

/// Postgres-backed [`ExecutionRepository`].
#[derive(Clone)]
pub struct PgExecutionRepository {
    pool: DbPool,
}

impl PgExecutionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionRepository for PgExecutionRepository {
    async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>, DbError> {
        let row = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM flow_executions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_open_by_phone(&self, phone: &str) -> Result<Option<ExecutionRow>, DbError> {
        let row = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM flow_executions \
             WHERE phone = $1 AND status IN ('active', 'handover') \
             ORDER BY started_at DESC LIMIT 1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_execution(&self, row: &ExecutionRow) -> Result<(), DbError> {
        sqlx::query(&format!(
            "INSERT INTO flow_executions ({EXECUTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(row.id)
        .bind(row.flow_id)
        .bind(&row.phone)
        .bind(&row.current_node_id)
        .bind(&row.status)
        .bind(&row.context)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(row.paused_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::from_insert(e, &format!("phone {} already has an open execution", row.phone))
        })?;

        Ok(())
    }

    async fn update_execution(&self, row: &ExecutionRow) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE flow_executions
            SET flow_id = $2, current_node_id = $3, status = $4, context = $5,
                completed_at = $6, paused_at = $7
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.flow_id)
        .bind(&row.current_node_id)
        .bind(&row.status)
        .bind(&row.context)
        .bind(row.completed_at)
        .bind(row.paused_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn cancel_open_for_phone(&self, phone: &str) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE flow_executions
            SET status = 'cancelled', completed_at = $2
            WHERE phone = $1 AND status IN ('active', 'handover')
            "#,
        )
        .bind(phone)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
