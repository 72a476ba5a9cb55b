//! In-memory repositories.
//!
//! Same contracts as the Postgres implementations, including the open
//! execution uniqueness rule and the atomic guarded slot update. Used by the
//! test suites and the CLI simulator.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{DeliverySlot, ExecutionRow, ExecutionStatus, FlowRow};
use crate::repository::{ExecutionRepository, FlowRepository, SlotRepository};
use crate::DbError;

// ---------------------------------------------------------------------------
// flows
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryFlowRepository {
    flows: RwLock<Vec<FlowRow>>,
}

impl MemoryFlowRepository {
    pub fn new(flows: Vec<FlowRow>) -> Self {
        Self {
            flows: RwLock::new(flows),
        }
    }

    /// Insert or replace by id. New flows go to the end of storage order.
    pub async fn upsert(&self, flow: FlowRow) {
        let mut flows = self.flows.write().await;
        match flows.iter_mut().find(|f| f.id == flow.id) {
            Some(existing) => *existing = flow,
            None => flows.push(flow),
        }
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let mut flows = self.flows.write().await;
        let before = flows.len();
        flows.retain(|f| f.id != id);
        flows.len() != before
    }
}

#[async_trait]
impl FlowRepository for MemoryFlowRepository {
    async fn get_flow(&self, id: Uuid) -> Result<Option<FlowRow>, DbError> {
        Ok(self.flows.read().await.iter().find(|f| f.id == id).cloned())
    }

    async fn list_active_flows(&self) -> Result<Vec<FlowRow>, DbError> {
        Ok(self
            .flows
            .read()
            .await
            .iter()
            .filter(|f| f.is_active)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// executions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryExecutionRepository {
    rows: Mutex<Vec<ExecutionRow>>,
}

impl MemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every execution ever stored, in insertion order.
    pub async fn all(&self) -> Vec<ExecutionRow> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl ExecutionRepository for MemoryExecutionRepository {
    async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>, DbError> {
        Ok(self.rows.lock().await.iter().find(|r| r.id == id).cloned())
    }

    async fn find_open_by_phone(&self, phone: &str) -> Result<Option<ExecutionRow>, DbError> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .rev()
            .find(|r| r.phone == phone && r.is_open())
            .cloned())
    }

    async fn insert_execution(&self, row: &ExecutionRow) -> Result<(), DbError> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|r| r.id == row.id) {
            return Err(DbError::Conflict(format!("execution {} already exists", row.id)));
        }
        if row.is_open() && rows.iter().any(|r| r.phone == row.phone && r.is_open()) {
            return Err(DbError::Conflict(format!(
                "phone {} already has an open execution",
                row.phone
            )));
        }
        rows.push(row.clone());
        Ok(())
    }

    async fn update_execution(&self, row: &ExecutionRow) -> Result<(), DbError> {
        let mut rows = self.rows.lock().await;
        if row.is_open()
            && rows
                .iter()
                .any(|r| r.id != row.id && r.phone == row.phone && r.is_open())
        {
            return Err(DbError::Conflict(format!(
                "phone {} already has an open execution",
                row.phone
            )));
        }
        let existing = rows
            .iter_mut()
            .find(|r| r.id == row.id)
            .ok_or(DbError::NotFound)?;
        *existing = row.clone();
        Ok(())
    }

    async fn cancel_open_for_phone(&self, phone: &str) -> Result<u64, DbError> {
        let now = Utc::now();
        let mut affected = 0;
        for row in self.rows.lock().await.iter_mut() {
            if row.phone == phone && row.is_open() {
                row.status = ExecutionStatus::Cancelled.to_string();
                row.completed_at = Some(now);
                affected += 1;
            }
        }
        Ok(affected)
    }
}

// ---------------------------------------------------------------------------
// delivery slots
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySlotRepository {
    slots: Mutex<HashMap<Uuid, DeliverySlot>>,
}

impl MemorySlotRepository {
    pub fn new(slots: Vec<DeliverySlot>) -> Self {
        Self {
            slots: Mutex::new(slots.into_iter().map(|s| (s.id, s)).collect()),
        }
    }
}

#[async_trait]
impl SlotRepository for MemorySlotRepository {
    async fn get_slot(&self, id: Uuid) -> Result<Option<DeliverySlot>, DbError> {
        Ok(self.slots.lock().await.get(&id).cloned())
    }

    async fn list_slots(&self) -> Result<Vec<DeliverySlot>, DbError> {
        let mut slots: Vec<DeliverySlot> = self.slots.lock().await.values().cloned().collect();
        slots.sort_by(|a, b| (a.date, a.time_start, a.id).cmp(&(b.date, b.time_start, b.id)));
        Ok(slots)
    }

    async fn compare_and_set_orders(
        &self,
        id: Uuid,
        expected_version: i64,
        new_count: i32,
    ) -> Result<u64, DbError> {
        let mut slots = self.slots.lock().await;
        match slots.get_mut(&id) {
            Some(slot)
                if slot.version == expected_version
                    && (0..=slot.max_orders).contains(&new_count) =>
            {
                slot.orders_count = new_count;
                slot.version += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
