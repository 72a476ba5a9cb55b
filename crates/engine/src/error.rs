//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the flow engine (authoring validation + persistence).
///
/// Conversation-level problems (no matching flow, a failing executor, a
/// vanished node) are answered with a message to the correspondent and
/// never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the flow.
    #[error("edge '{edge_id}' references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        edge_id: String,
        node_id: String,
        side: &'static str,
    },

    /// A node has several outgoing edges that `sourceHandle` does not tell apart.
    #[error("node '{0}' has ambiguous outgoing edges")]
    AmbiguousEdges(String),

    /// The flow has no nodes at all.
    #[error("flow has no nodes")]
    EmptyFlow,

    // ------ Runtime errors ------

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    /// A stored flow or execution could not be decoded.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}
