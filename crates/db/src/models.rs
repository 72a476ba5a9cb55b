//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models; they carry no domain behaviour.
//! Domain types (parsed nodes and edges, typed context) live in the
//! `engine` and `nodes` crates.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// flows
// ---------------------------------------------------------------------------

/// A persisted flow definition row, as produced by the editor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlowRow {
    pub id: Uuid,
    pub name: String,
    /// Phrase that starts this flow for a correspondent with no open execution.
    pub trigger_word: String,
    pub is_active: bool,
    /// JSON array of `{ id, type, data, position }`.
    pub nodes: serde_json::Value,
    /// JSON array of `{ id, source, target, sourceHandle? }`.
    pub edges: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// flow_executions
// ---------------------------------------------------------------------------

/// Possible statuses for a flow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Active,
    Completed,
    Cancelled,
    Error,
    /// Paused while a human agent owns the conversation.
    Handover,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
            Self::Handover => "handover",
        }
    }

    /// Open executions still own their phone.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::Handover)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active"    => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "error"     => Ok(Self::Error),
            "handover"  => Ok(Self::Handover),
            other       => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Statuses stored as text; used in `WHERE status IN (..)` clauses.
pub const OPEN_STATUSES: [&str; 2] = ["active", "handover"];

/// A persisted flow execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub phone: String,
    pub current_node_id: String,
    pub status: String,
    /// JSON object of context variables.
    pub context: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
}

impl ExecutionRow {
    /// Whether the stored status is open. Unknown statuses count as closed.
    pub fn is_open(&self) -> bool {
        self.status
            .parse::<ExecutionStatus>()
            .map(|s| s.is_open())
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// delivery_slots
// ---------------------------------------------------------------------------

/// A delivery window with bounded capacity, guarded by an optimistic-lock
/// `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeliverySlot {
    pub id: Uuid,
    pub date: NaiveDate,
    pub time_start: NaiveTime,
    pub time_end: NaiveTime,
    pub max_orders: i32,
    pub orders_count: i32,
    pub version: i64,
}

impl DeliverySlot {
    pub fn has_capacity(&self) -> bool {
        self.orders_count < self.max_orders
    }

    pub fn remaining(&self) -> u32 {
        u32::try_from(self.max_orders - self.orders_count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ExecutionStatus::Active,
            ExecutionStatus::Completed,
            ExecutionStatus::Cancelled,
            ExecutionStatus::Error,
            ExecutionStatus::Handover,
        ] {
            assert_eq!(status.to_string().parse::<ExecutionStatus>(), Ok(status));
        }
        assert!("paused".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn only_active_and_handover_are_open() {
        assert!(ExecutionStatus::Active.is_open());
        assert!(ExecutionStatus::Handover.is_open());
        assert!(!ExecutionStatus::Completed.is_open());
        assert!(!ExecutionStatus::Cancelled.is_open());
        assert!(!ExecutionStatus::Error.is_open());
    }
}
