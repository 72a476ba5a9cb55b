//! Node-level error types.

use thiserror::Error;

/// Errors returned by a collaborator service (catalog, orders, slots, …).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// The requested delivery slot could not be reserved (full or contended).
    #[error("delivery slot '{0}' is not available")]
    SlotUnavailable(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other failure reported by the collaborator.
    #[error("service failure: {0}")]
    Failed(String),
}

/// Errors returned by a node executor.
///
/// Neither variant is fatal for the conversation: the engine reports the
/// failure to the correspondent and leaves the execution on the same node.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// The node's `data` block could not be interpreted.
    #[error("invalid node configuration: {0}")]
    Config(String),

    /// A collaborator call failed in a way the executor could not absorb.
    #[error(transparent)]
    Service(#[from] ServiceError),
}
