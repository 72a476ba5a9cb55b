//! `engine` crate: flow domain models, graph validation, and the
//! conversation execution engine.

pub mod config;
pub mod error;
pub mod flow_engine;
pub mod graph;
pub mod locks;
pub mod models;
pub mod orders;
pub mod services;

pub use config::EngineConfig;
pub use error::EngineError;
pub use flow_engine::FlowEngine;
pub use graph::validate_flow;
pub use models::{Edge, FlowDefinition, FlowExecution, Node};
pub use orders::SlotReservingOrders;
pub use services::ReservingSlotService;
