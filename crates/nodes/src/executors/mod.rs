//! Built-in executors, one per node type.
//!
//! `flowLink` has no executor: the engine interprets it itself.

pub mod basic;
pub mod cart;
pub mod catalog;
pub mod condition;
pub mod handover;
pub mod media;
pub mod order;
pub mod poll;
pub mod report;
pub mod slot;
pub mod timer;

pub use basic::{MessageExecutor, PassThroughExecutor, QuestionExecutor};
pub use cart::{AddToCartExecutor, OrderSummaryExecutor, StockCheckExecutor, StockResult};
pub use catalog::CatalogExecutor;
pub use condition::ConditionExecutor;
pub use handover::HandoverExecutor;
pub use media::MediaUploadExecutor;
pub use order::{CreateOrderExecutor, DocumentExecutor};
pub use poll::PollExecutor;
pub use report::ReportExecutor;
pub use slot::SlotExecutor;
pub use timer::TimerExecutor;

/// Context keys shared between executors (and seeded by the engine).
pub mod keys {
    pub const PHONE: &str = "phone";

    pub const CART: &str = "cart";
    pub const CART_TOTAL: &str = "cart_total";

    pub const STOCK_RESULT: &str = "_stock_result";
    pub const QUANTITY: &str = "_quantity";
    pub const STOCK_AVAILABLE: &str = "stock_available";

    pub const AVAILABLE_SLOTS: &str = "_available_slots";
    pub const SLOT_ID: &str = "slot_id";
    pub const SLOT_LABEL: &str = "slot";

    pub const ORDER: &str = "order";
    pub const ORDER_ID: &str = "order_id";
    pub const ORDER_TOTAL: &str = "order_total";
    pub const ORDER_ERROR: &str = "order_error";

    /// Injected by the transport layer when a file arrives.
    pub const MEDIA_URL: &str = "_media_url";

    pub const REPORT_ID: &str = "report_id";
}
