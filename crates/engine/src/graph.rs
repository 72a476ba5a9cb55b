//! Flow graph validation and navigation.
//!
//! Rules enforced by [`validate_flow`] (run it before persisting a flow):
//! 1. The flow has at least one node.
//! 2. Node IDs must be unique within the flow.
//! 3. Every edge must reference valid node IDs (both `source` and `target`).
//! 4. A node with several outgoing edges must tell them apart by distinct
//!    `sourceHandle`s.
//!
//! Cycles are allowed: a conversation may loop back to an earlier question.
//! The engine guards against cycles that never wait for input at run time.

use std::collections::{HashMap, HashSet};

use crate::models::{Edge, FlowDefinition, Node};
use crate::EngineError;

/// Validate the flow and return the ID of its start node.
///
/// # Errors
/// - [`EngineError::EmptyFlow`] if there are no nodes.
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::AmbiguousEdges`] if a node's outgoing edges cannot be told apart.
pub fn validate_flow(flow: &FlowDefinition) -> Result<String, EngineError> {
    // -----------------------------------------------------------------------
    // 1–2. Non-empty, unique IDs
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &flow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 3. Edge endpoints
    // -----------------------------------------------------------------------
    for edge in &flow.edges {
        for (node_id, side) in [(&edge.source, "source"), (&edge.target, "target")] {
            if !seen_ids.contains(node_id.as_str()) {
                return Err(EngineError::UnknownNodeReference {
                    edge_id: edge.id.clone(),
                    node_id: node_id.clone(),
                    side,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // 4. Outgoing edges must be distinguishable
    // -----------------------------------------------------------------------
    let mut outgoing: HashMap<&str, Vec<Option<&str>>> = HashMap::new();
    for edge in &flow.edges {
        outgoing
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.source_handle.as_deref());
    }
    for node in &flow.nodes {
        let Some(handles) = outgoing.get(node.id.as_str()) else {
            continue;
        };
        if handles.len() < 2 {
            continue;
        }
        let mut distinct = HashSet::new();
        let all_distinct = handles
            .iter()
            .all(|h| h.is_some_and(|h| distinct.insert(h)));
        if !all_distinct {
            return Err(EngineError::AmbiguousEdges(node.id.clone()));
        }
    }

    start_node(flow)
        .map(|n| n.id.clone())
        .ok_or(EngineError::EmptyFlow)
}

/// Where a new execution starts: the `input`/`start` node, else the first
/// node that is the target of no edge, else the first declared node.
pub fn start_node(flow: &FlowDefinition) -> Option<&Node> {
    if let Some(entry) = flow.nodes.iter().find(|n| n.kind.is_entry()) {
        return Some(entry);
    }

    let targets: HashSet<&str> = flow.edges.iter().map(|e| e.target.as_str()).collect();
    flow.nodes
        .iter()
        .find(|n| !targets.contains(n.id.as_str()))
        .or_else(|| flow.nodes.first())
}

/// The first outgoing edge of `node_id` in storage order, handles ignored.
pub fn first_edge<'a>(flow: &'a FlowDefinition, node_id: &str) -> Option<&'a Edge> {
    flow.edges.iter().find(|e| e.source == node_id)
}

/// The outgoing edge of `node_id` whose `sourceHandle` is `"true"`/`"false"`.
pub fn branch_edge<'a>(flow: &'a FlowDefinition, node_id: &str, branch: bool) -> Option<&'a Edge> {
    let handle = if branch { "true" } else { "false" };
    flow.edges
        .iter()
        .find(|e| e.source == node_id && e.source_handle.as_deref() == Some(handle))
}
