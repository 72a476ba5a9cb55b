//! Postgres connection pool and embedded migrations.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Shared Postgres pool handed to every `Pg*Repository`.
pub type DbPool = PgPool;

/// Pool ceiling used by `chatflow migrate`.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Open the pool shared by `PgFlowRepository`, `PgExecutionRepository` and
/// `PgSlotRepository`. Slot reservations retry on version conflicts, so keep
/// `max_connections` above the expected number of concurrent checkouts.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!(max_connections, "connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the migrations embedded from the workspace `migrations/` directory
/// (flows, flow_executions, delivery_slots).
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("running database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
