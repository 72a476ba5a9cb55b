//! Repository traits and their Postgres implementations.
//!
//! Every method returns a `Result<T, DbError>`. No business logic, no
//! domain types: rows in, rows out. The in-memory implementations live in
//! [`crate::memory`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{DeliverySlot, ExecutionRow, FlowRow};
use crate::DbError;

pub mod executions;
pub mod flows;
pub mod slots;

pub use executions::PgExecutionRepository;
pub use flows::PgFlowRepository;
pub use slots::PgSlotRepository;

#[async_trait]
pub trait FlowRepository: Send + Sync {
    async fn get_flow(&self, id: Uuid) -> Result<Option<FlowRow>, DbError>;

    /// Active flows in storage order.
    async fn list_active_flows(&self) -> Result<Vec<FlowRow>, DbError>;
}

#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>, DbError>;

    /// The single active-or-handover execution for `phone`, if any.
    async fn find_open_by_phone(&self, phone: &str) -> Result<Option<ExecutionRow>, DbError>;

    /// Returns `DbError::Conflict` if `row` is open and the phone already
    /// has an open execution.
    async fn insert_execution(&self, row: &ExecutionRow) -> Result<(), DbError>;

    /// Overwrite every mutable column. `DbError::NotFound` if the row is gone.
    async fn update_execution(&self, row: &ExecutionRow) -> Result<(), DbError>;

    /// Mark the open execution (if any) as cancelled. Returns affected rows.
    async fn cancel_open_for_phone(&self, phone: &str) -> Result<u64, DbError>;
}

#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn get_slot(&self, id: Uuid) -> Result<Option<DeliverySlot>, DbError>;

    /// All slots ordered by date and start time.
    async fn list_slots(&self) -> Result<Vec<DeliverySlot>, DbError>;

    /// Set `orders_count = new_count` and bump `version`, only if the stored
    /// version still equals `expected_version` and `new_count` lies within
    /// `0..=max_orders`. Returns the number of rows changed (0 or 1).
    async fn compare_and_set_orders(
        &self,
        id: Uuid,
        expected_version: i64,
        new_count: i32,
    ) -> Result<u64, DbError>;
}
