//! `db` crate: persistence layer for flows, executions and delivery slots.
//!
//! Exposes repository traits with two implementations: Postgres (`repository::*`)
//! and in-memory (`memory`). The optimistic-lock retry loop and the slot
//! reservation protocol built on it live here too, since they are defined
//! purely in terms of the slot repository.

pub mod error;
pub mod memory;
pub mod models;
pub mod optimistic;
pub mod pool;
pub mod repository;
pub mod slots;

pub use error::DbError;
pub use models::{DeliverySlot, ExecutionRow, ExecutionStatus, FlowRow};
pub use optimistic::RetryPolicy;
pub use pool::DbPool;
pub use repository::{ExecutionRepository, FlowRepository, SlotRepository};
pub use slots::SlotReservations;
