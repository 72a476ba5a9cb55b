//! Collaborator interfaces consumed by the built-in executors.
//!
//! Implementations live outside this crate (catalog, order back-office,
//! receipt rendering, …). The engine crate provides the slot-reservation
//! backed [`SlotService`]; [`crate::mock`] provides in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: f64,
    /// Units on hand; `None` means the product is not stock-tracked.
    #[serde(default)]
    pub stock: Option<f64>,
}

impl Product {
    pub fn has_stock_for(&self, quantity: f64) -> bool {
        self.stock.map_or(true, |stock| stock >= quantity)
    }
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn get_products(&self) -> Result<Vec<Product>, ServiceError>;
    async fn find_product(&self, term: &str) -> Result<Option<Product>, ServiceError>;
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// One cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub quantity: f64,
    pub price: f64,
}

impl CartItem {
    pub fn subtotal(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Σ(price × quantity) over the cart.
pub fn cart_total(items: &[CartItem]) -> f64 {
    items.iter().map(CartItem::subtotal).sum()
}

/// Everything about an order besides its lines, gathered from the context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub phone: String,
    pub customer_name: Option<String>,
    pub address: Option<String>,
    pub payment_method: Option<String>,
    pub slot_id: Option<String>,
    pub slot_label: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub items: Vec<CartItem>,
    pub total: f64,
    pub metadata: OrderMetadata,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(
        &self,
        cart: &[CartItem],
        metadata: &OrderMetadata,
    ) -> Result<Order, ServiceError>;

    /// Pick a courier/assignee for the order, if one is available.
    async fn auto_assign_order(&self, order_id: &str) -> Result<Option<String>, ServiceError>;

    /// Turn free text ("2 manzanas, 1 leche") into cart lines.
    async fn parse_order_text(&self, text: &str) -> Result<Vec<CartItem>, ServiceError>;
}

// ---------------------------------------------------------------------------
// Delivery slots
// ---------------------------------------------------------------------------

/// A delivery window offered to the correspondent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotOption {
    pub id: String,
    pub date: NaiveDate,
    pub time_start: NaiveTime,
    pub time_end: NaiveTime,
    pub remaining: u32,
}

impl SlotOption {
    /// Human-readable label, e.g. `24/10 09:00-12:00`.
    pub fn label(&self) -> String {
        format!(
            "{} {}-{}",
            self.date.format("%d/%m"),
            self.time_start.format("%H:%M"),
            self.time_end.format("%H:%M"),
        )
    }
}

#[async_trait]
pub trait SlotService: Send + Sync {
    async fn get_available_slots(&self) -> Result<Vec<SlotOption>, ServiceError>;
    /// `false` when the slot is full, missing, or could not be reserved
    /// because of contention.
    async fn reserve_slot(&self, id: &str) -> Result<bool, ServiceError>;
    async fn release_slot(&self, id: &str) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// Documents, reports, handover
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render a receipt (PDF) for the order.
    async fn generate_receipt(&self, order: &Order) -> Result<Vec<u8>, ServiceError>;
}

/// A claim/report raised from a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub phone: String,
    pub category: String,
    pub description: String,
    /// Snapshot of the non-transient context at the time of the report.
    pub context: serde_json::Value,
}

#[async_trait]
pub trait ReportService: Send + Sync {
    /// Returns the new report's id.
    async fn create_report(&self, report: &Report) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait HandoverService: Send + Sync {
    /// Flag the conversation for human attention.
    async fn request_human(&self, phone: &str, reason: &str) -> Result<(), ServiceError>;
}
