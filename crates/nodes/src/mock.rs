//! Test doubles: a scriptable `MockExecutor` and in-memory collaborators.
//!
//! Useful in unit and integration tests, and for the CLI simulator, where
//! real catalog/order back-ends are unavailable or irrelevant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::context::Context;
use crate::registry::Services;
use crate::services::{
    cart_total, CartItem, CatalogService, DocumentRenderer, HandoverService, Order,
    OrderMetadata, OrderService, Product, Report, ReportService, SlotOption, SlotService,
};
use crate::text::{format_money, format_quantity, normalize, parse_order_lines};
use crate::traits::{capture_into_variable, InputOutcome, NodeExecutor, NodeResult};
use crate::{NodeError, ServiceError};

// ---------------------------------------------------------------------------
// MockExecutor
// ---------------------------------------------------------------------------

/// Behaviour injected into `MockExecutor` at construction time.
pub enum MockBehaviour {
    /// Return a specific result.
    Return(NodeResult),
    /// Fail with the given error.
    Fail(NodeError),
}

/// A mock executor that records every config it receives and returns a
/// programmer-specified result.
pub struct MockExecutor {
    pub behaviour: MockBehaviour,
    /// All node configs seen by this executor (in call order).
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl MockExecutor {
    pub fn returning(result: NodeResult) -> Self {
        Self {
            behaviour: MockBehaviour::Return(result),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(error: NodeError) -> Self {
        Self {
            behaviour: MockBehaviour::Fail(error),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this executor has been entered.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl NodeExecutor for MockExecutor {
    async fn execute(&self, config: &Value, _ctx: &Context) -> Result<NodeResult, NodeError> {
        self.calls.lock().unwrap().push(config.clone());

        match &self.behaviour {
            MockBehaviour::Return(result) => Ok(result.clone()),
            MockBehaviour::Fail(e) => Err(e.clone()),
        }
    }

    async fn capture_input(
        &self,
        config: &Value,
        input: &str,
        _ctx: &Context,
    ) -> Result<InputOutcome, NodeError> {
        capture_into_variable(config, input)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A fixed product list. Lookup is exact (normalized) first, then by
/// substring in either direction.
pub struct StaticCatalog {
    products: Vec<Product>,
}

impl StaticCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn get_products(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.products.clone())
    }

    async fn find_product(&self, term: &str) -> Result<Option<Product>, ServiceError> {
        let wanted = normalize(term);
        if wanted.is_empty() {
            return Ok(None);
        }

        let exact = self.products.iter().find(|p| normalize(&p.name) == wanted);
        let partial = || {
            self.products.iter().find(|p| {
                let name = normalize(&p.name);
                wanted.contains(&name) || name.contains(&wanted)
            })
        };
        Ok(exact.or_else(partial).cloned())
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Keeps orders in memory. Parses free text against a catalog.
pub struct MemoryOrders {
    catalog: Arc<dyn CatalogService>,
    orders: Mutex<Vec<Order>>,
    next_id: AtomicU64,
    assignee: Option<String>,
    fail_next: Mutex<Option<ServiceError>>,
}

impl MemoryOrders {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self {
            catalog,
            orders: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1001),
            assignee: None,
            fail_next: Mutex::new(None),
        }
    }

    /// Every order gets auto-assigned to `name`.
    pub fn with_assignee(mut self, name: impl Into<String>) -> Self {
        self.assignee = Some(name.into());
        self
    }

    /// Make the next `create_order` call fail with `error`.
    pub fn fail_next_create(&self, error: ServiceError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn created(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderService for MemoryOrders {
    async fn create_order(
        &self,
        cart: &[CartItem],
        metadata: &OrderMetadata,
    ) -> Result<Order, ServiceError> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }

        let order = Order {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            items: cart.to_vec(),
            total: cart_total(cart),
            metadata: metadata.clone(),
            created_at: Utc::now(),
        };
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }

    async fn auto_assign_order(&self, _order_id: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.assignee.clone())
    }

    async fn parse_order_text(&self, text: &str) -> Result<Vec<CartItem>, ServiceError> {
        let mut items = Vec::new();
        for (quantity, term) in parse_order_lines(text) {
            if let Some(product) = self.catalog.find_product(&term).await? {
                items.push(CartItem {
                    product_id: product.id,
                    name: product.name,
                    quantity,
                    price: product.price,
                });
            }
        }
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A fixed list of slots with naive capacity tracking.
pub struct FixedSlots {
    slots: Mutex<Vec<SlotOption>>,
}

impl FixedSlots {
    pub fn new(slots: Vec<SlotOption>) -> Self {
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn remaining(&self, id: &str) -> Option<u32> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.remaining)
    }
}

#[async_trait]
impl SlotService for FixedSlots {
    async fn get_available_slots(&self) -> Result<Vec<SlotOption>, ServiceError> {
        Ok(self
            .slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.remaining > 0)
            .cloned()
            .collect())
    }

    async fn reserve_slot(&self, id: &str) -> Result<bool, ServiceError> {
        let mut slots = self.slots.lock().unwrap();
        match slots.iter_mut().find(|s| s.id == id) {
            Some(slot) if slot.remaining > 0 => {
                slot.remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_slot(&self, id: &str) -> Result<(), ServiceError> {
        if let Some(slot) = self.slots.lock().unwrap().iter_mut().find(|s| s.id == id) {
            slot.remaining += 1;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Documents, reports, handover
// ---------------------------------------------------------------------------

/// Renders a plain-text receipt. Stands in for the PDF renderer.
pub struct TextReceiptRenderer;

#[async_trait]
impl DocumentRenderer for TextReceiptRenderer {
    async fn generate_receipt(&self, order: &Order) -> Result<Vec<u8>, ServiceError> {
        let mut out = format!("Pedido #{}\n", order.id);
        for item in &order.items {
            out.push_str(&format!(
                "{} x {} {}\n",
                format_quantity(item.quantity),
                item.name,
                format_money(item.subtotal())
            ));
        }
        out.push_str(&format!("Total {}\n", format_money(order.total)));
        Ok(out.into_bytes())
    }
}

#[derive(Default)]
pub struct RecordingReports {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReports {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportService for RecordingReports {
    async fn create_report(&self, report: &Report) -> Result<String, ServiceError> {
        let mut reports = self.reports.lock().unwrap();
        reports.push(report.clone());
        Ok(format!("R-{}", reports.len()))
    }
}

#[derive(Default)]
pub struct RecordingHandover {
    requests: Mutex<Vec<(String, String)>>,
}

impl RecordingHandover {
    /// `(phone, reason)` pairs, in call order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HandoverService for RecordingHandover {
    async fn request_human(&self, phone: &str, reason: &str) -> Result<(), ServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((phone.to_owned(), reason.to_owned()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn product(id: &str, name: &str, category: &str, price: f64, stock: Option<f64>) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        category: Some(category.into()),
        price,
        stock,
    }
}

pub fn sample_products() -> Vec<Product> {
    vec![
        product("p-manzana", "Manzana", "Frutas", 2.5, Some(100.0)),
        product("p-banana", "Banana", "Frutas", 1.8, Some(50.0)),
        product("p-leche", "Leche", "Lácteos", 3.0, None),
        product("p-pan", "Pan", "Panadería", 1.2, Some(10.0)),
    ]
}

fn slot(id: &str, start: (u32, u32), end: (u32, u32), remaining: u32) -> SlotOption {
    SlotOption {
        id: id.into(),
        date: NaiveDate::from_ymd_opt(2026, 10, 24).unwrap_or_default(),
        time_start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or_default(),
        time_end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or_default(),
        remaining,
    }
}

pub fn sample_slots() -> Vec<SlotOption> {
    vec![
        slot("slot-am", (9, 0), (12, 0), 3),
        slot("slot-pm", (14, 0), (18, 0), 5),
    ]
}

/// In-memory collaborators over the sample fixtures.
pub fn demo_services() -> Services {
    let catalog: Arc<StaticCatalog> = Arc::new(StaticCatalog::new(sample_products()));
    Services {
        catalog: catalog.clone(),
        orders: Arc::new(MemoryOrders::new(catalog)),
        slots: Arc::new(FixedSlots::new(sample_slots())),
        documents: Arc::new(TextReceiptRenderer),
        reports: Arc::new(RecordingReports::default()),
        handover: Arc::new(RecordingHandover::default()),
    }
}
