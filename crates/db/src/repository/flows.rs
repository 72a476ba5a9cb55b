//! Flow definition reads.

use async_trait::async_trait;
use uuid::Uuid;

use super::FlowRepository;
use crate::{models::FlowRow, DbError, DbPool};

const FLOW_COLUMNS: &str =
    "id, name, trigger_word, is_active, nodes, edges, created_at, updated_at";

/// Postgres-backed [`FlowRepository`].
#[derive(Clone)]
pub struct PgFlowRepository {
    pool: DbPool,
}

impl PgFlowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlowRepository for PgFlowRepository {
    async fn get_flow(&self, id: Uuid) -> Result<Option<FlowRow>, DbError> {
        let row = sqlx::query_as::<_, FlowRow>(&format!(
            "SELECT {FLOW_COLUMNS} FROM flows WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_active_flows(&self) -> Result<Vec<FlowRow>, DbError> {
        let rows = sqlx::query_as::<_, FlowRow>(&format!(
            "SELECT {FLOW_COLUMNS} FROM flows WHERE is_active ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
