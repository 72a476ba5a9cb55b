//! Executor registry: node kind → executor, built once at startup and
//! injected into the engine.

use std::collections::HashMap;
use std::sync::Arc;

use crate::executors::{
    AddToCartExecutor, CatalogExecutor, ConditionExecutor, CreateOrderExecutor, DocumentExecutor,
    HandoverExecutor, MediaUploadExecutor, MessageExecutor, OrderSummaryExecutor,
    PassThroughExecutor, PollExecutor, QuestionExecutor, ReportExecutor, SlotExecutor,
    StockCheckExecutor, TimerExecutor,
};
use crate::services::{
    CatalogService, DocumentRenderer, HandoverService, OrderService, ReportService, SlotService,
};
use crate::{NodeExecutor, NodeKind};

/// Maps node kinds to executor implementations.
pub type ExecutorRegistry = HashMap<NodeKind, Arc<dyn NodeExecutor>>;

/// The collaborators the built-in executors depend on.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn CatalogService>,
    pub orders: Arc<dyn OrderService>,
    pub slots: Arc<dyn SlotService>,
    pub documents: Arc<dyn DocumentRenderer>,
    pub reports: Arc<dyn ReportService>,
    pub handover: Arc<dyn HandoverService>,
}

/// Register every built-in executor.
pub fn standard_registry(services: &Services) -> ExecutorRegistry {
    let pass_through: Arc<dyn NodeExecutor> = Arc::new(PassThroughExecutor);

    let mut registry = ExecutorRegistry::new();
    registry.insert(NodeKind::Input, pass_through.clone());
    registry.insert(NodeKind::Start, pass_through);
    registry.insert(NodeKind::Message, Arc::new(MessageExecutor));
    registry.insert(NodeKind::Question, Arc::new(QuestionExecutor));
    registry.insert(NodeKind::Poll, Arc::new(PollExecutor));
    registry.insert(
        NodeKind::Catalog,
        Arc::new(CatalogExecutor::new(
            services.catalog.clone(),
            services.orders.clone(),
        )),
    );
    registry.insert(NodeKind::Slot, Arc::new(SlotExecutor::new(services.slots.clone())));
    registry.insert(
        NodeKind::StockCheck,
        Arc::new(StockCheckExecutor::new(services.catalog.clone())),
    );
    registry.insert(NodeKind::AddToCart, Arc::new(AddToCartExecutor));
    registry.insert(
        NodeKind::CreateOrder,
        Arc::new(CreateOrderExecutor::new(services.orders.clone())),
    );
    registry.insert(NodeKind::OrderSummary, Arc::new(OrderSummaryExecutor));
    registry.insert(NodeKind::Condition, Arc::new(ConditionExecutor));
    registry.insert(NodeKind::MediaUpload, Arc::new(MediaUploadExecutor));
    registry.insert(
        NodeKind::Document,
        Arc::new(DocumentExecutor::new(services.documents.clone())),
    );
    registry.insert(
        NodeKind::Handover,
        Arc::new(HandoverExecutor::new(services.handover.clone())),
    );
    registry.insert(NodeKind::Timer, Arc::new(TimerExecutor));
    registry.insert(
        NodeKind::Report,
        Arc::new(ReportExecutor::new(services.reports.clone())),
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::demo_services;

    #[test]
    fn every_kind_but_flow_link_has_an_executor() {
        let registry = standard_registry(&demo_services());
        assert_eq!(registry.len(), 17);
        assert!(!registry.contains_key(&NodeKind::FlowLink));
        assert!(registry.contains_key(&NodeKind::StockCheck));
    }
}
