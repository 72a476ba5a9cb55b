//! Core domain models for the flow engine.
//!
//! These are the typed views of the `flows` and `flow_executions` rows. A
//! flow's `nodes`/`edges` columns hold exactly the JSON the editor produces,
//! so the same structs double as the on-disk format read by the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use db::{ExecutionRow, ExecutionStatus, FlowRow};
use nodes::{Context, NodeKind};

use crate::EngineError;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this flow (referenced by edges).
    pub id: String,
    /// Selects the executor.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Free-form configuration handed to the executor.
    #[serde(default)]
    pub data: Value,
    /// Editor layout only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    /// `"true"` / `"false"` on the outgoing edges of a branching node.
    #[serde(
        default,
        rename = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
}

// ---------------------------------------------------------------------------
// FlowDefinition
// ---------------------------------------------------------------------------

fn default_active() -> bool {
    true
}

/// A complete flow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(default, alias = "triggerWord")]
    pub trigger_word: String,
    #[serde(default = "default_active", alias = "isActive")]
    pub is_active: bool,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl FlowDefinition {
    /// Decode the JSON columns of a stored flow.
    pub fn from_row(row: FlowRow) -> Result<Self, EngineError> {
        let nodes = serde_json::from_value(row.nodes).map_err(|e| {
            EngineError::CorruptRecord(format!("flow {} nodes: {e}", row.id))
        })?;
        let edges = serde_json::from_value(row.edges).map_err(|e| {
            EngineError::CorruptRecord(format!("flow {} edges: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            trigger_word: row.trigger_word,
            is_active: row.is_active,
            nodes,
            edges,
        })
    }

    pub fn to_row(&self) -> Result<FlowRow, EngineError> {
        let now = Utc::now();
        let encode = |what: &str, e: serde_json::Error| {
            EngineError::CorruptRecord(format!("flow {} {what}: {e}", self.id))
        };

        Ok(FlowRow {
            id: self.id,
            name: self.name.clone(),
            trigger_word: self.trigger_word.clone(),
            is_active: self.is_active,
            nodes: serde_json::to_value(&self.nodes).map_err(|e| encode("nodes", e))?,
            edges: serde_json::to_value(&self.edges).map_err(|e| encode("edges", e))?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// FlowExecution
// ---------------------------------------------------------------------------

/// One correspondent's run through a flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowExecution {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub phone: String,
    pub current_node_id: String,
    pub status: ExecutionStatus,
    pub context: Context,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
}

impl FlowExecution {
    /// A fresh active execution positioned on `start_node_id`.
    pub fn new(
        flow_id: Uuid,
        phone: impl Into<String>,
        start_node_id: impl Into<String>,
        context: Context,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow_id,
            phone: phone.into(),
            current_node_id: start_node_id.into(),
            status: ExecutionStatus::Active,
            context,
            started_at: Utc::now(),
            completed_at: None,
            paused_at: None,
        }
    }

    pub fn from_row(row: ExecutionRow) -> Result<Self, EngineError> {
        let status = row.status.parse::<ExecutionStatus>().map_err(|e| {
            EngineError::CorruptRecord(format!("execution {}: {e}", row.id))
        })?;
        let context = Context::from_json(row.context).map_err(|e| {
            EngineError::CorruptRecord(format!("execution {} context: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            flow_id: row.flow_id,
            phone: row.phone,
            current_node_id: row.current_node_id,
            status,
            context,
            started_at: row.started_at,
            completed_at: row.completed_at,
            paused_at: row.paused_at,
        })
    }

    pub fn to_row(&self) -> ExecutionRow {
        ExecutionRow {
            id: self.id,
            flow_id: self.flow_id,
            phone: self.phone.clone(),
            current_node_id: self.current_node_id.clone(),
            status: self.status.to_string(),
            context: self.context.to_json(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            paused_at: self.paused_at,
        }
    }

    /// Move to a terminal status.
    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
        self.paused_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn editor_json_parses_into_a_definition() {
        let flow: FlowDefinition = serde_json::from_value(json!({
            "id": "7f3c2a8e-0d6b-4a43-9a53-0f1e9c1d2b3a",
            "name": "Pedidos",
            "trigger_word": "pedido",
            "nodes": [
                { "id": "n1", "type": "input", "position": { "x": 0, "y": 0 } },
                { "id": "n2", "type": "condition", "data": { "variable": "edad" } },
                { "id": "n3", "type": "somethingNew" }
            ],
            "edges": [
                { "id": "e1", "source": "n1", "target": "n2" },
                { "id": "e2", "source": "n2", "target": "n3", "sourceHandle": "true" }
            ]
        }))
        .unwrap();

        assert!(flow.is_active);
        assert_eq!(flow.nodes[0].kind, NodeKind::Input);
        assert_eq!(flow.nodes[2].kind, NodeKind::Other("somethingNew".into()));
        assert_eq!(flow.nodes[0].data, Value::Null);
        assert_eq!(flow.edges[1].source_handle.as_deref(), Some("true"));
    }

    #[test]
    fn execution_survives_a_row_round_trip() {
        let mut ctx = Context::new();
        ctx.insert("phone", "549111");
        ctx.insert("edad", 30.0);

        let execution = FlowExecution::new(Uuid::new_v4(), "549111", "n1", ctx);
        let back = FlowExecution::from_row(execution.to_row()).unwrap();
        assert_eq!(back, execution);
    }

    #[test]
    fn unknown_status_is_a_corrupt_record() {
        let mut row = FlowExecution::new(Uuid::new_v4(), "1", "n1", Context::new()).to_row();
        row.status = "paused".into();
        assert!(matches!(
            FlowExecution::from_row(row),
            Err(EngineError::CorruptRecord(_))
        ));
    }
}
