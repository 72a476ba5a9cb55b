//! `nodes` crate: the `NodeExecutor` contract and the built-in executors.
//!
//! Every node type a flow can contain (except `flowLink`, which the engine
//! interprets itself) is backed by an implementation of [`NodeExecutor`].
//! Executors never touch persistence: they read the conversation
//! [`Context`], talk to the injected service traits, and describe their
//! effect as a [`NodeResult`].

pub mod context;
pub mod error;
pub mod executors;
pub mod kind;
pub mod message;
pub mod mock;
pub mod registry;
pub mod services;
pub mod text;
pub mod traits;

pub use context::{Context, ContextPatch, ContextValue};
pub use error::{NodeError, ServiceError};
pub use kind::NodeKind;
pub use message::OutboundMessage;
pub use registry::{standard_registry, ExecutorRegistry, Services};
pub use traits::{InputOutcome, NodeExecutor, NodeResult};
