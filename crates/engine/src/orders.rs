//! Order creation with delivery slot reservation.
//!
//! Wraps any `OrderService`: when the order metadata names a slot, the slot
//! is reserved first and released again if the order cannot be persisted.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use nodes::services::{CartItem, Order, OrderMetadata, OrderService, SlotService};
use nodes::ServiceError;

pub struct SlotReservingOrders {
    inner: Arc<dyn OrderService>,
    slots: Arc<dyn SlotService>,
}

impl SlotReservingOrders {
    pub fn new(inner: Arc<dyn OrderService>, slots: Arc<dyn SlotService>) -> Self {
        Self { inner, slots }
    }
}

#[async_trait]
impl OrderService for SlotReservingOrders {
    async fn create_order(
        &self,
        cart: &[CartItem],
        metadata: &OrderMetadata,
    ) -> Result<Order, ServiceError> {
        let Some(slot_id) = metadata.slot_id.as_deref().filter(|s| !s.is_empty()) else {
            return self.inner.create_order(cart, metadata).await;
        };

        if !self.slots.reserve_slot(slot_id).await? {
            warn!(%slot_id, phone = %metadata.phone, "slot could not be reserved");
            return Err(ServiceError::SlotUnavailable(slot_id.to_owned()));
        }

        match self.inner.create_order(cart, metadata).await {
            Ok(order) => {
                info!(order_id = %order.id, %slot_id, "order created with slot");
                Ok(order)
            }
            Err(e) => {
                warn!(%slot_id, error = %e, "order failed after reservation, releasing slot");
                if let Err(release_err) = self.slots.release_slot(slot_id).await {
                    error!(%slot_id, error = %release_err, "slot release failed");
                }
                Err(e)
            }
        }
    }

    async fn auto_assign_order(&self, order_id: &str) -> Result<Option<String>, ServiceError> {
        self.inner.auto_assign_order(order_id).await
    }

    async fn parse_order_text(&self, text: &str) -> Result<Vec<CartItem>, ServiceError> {
        self.inner.parse_order_text(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::mock::{sample_products, sample_slots, FixedSlots, MemoryOrders, StaticCatalog};

    fn cart() -> Vec<CartItem> {
        vec![CartItem {
            product_id: "p-pan".into(),
            name: "Pan".into(),
            quantity: 2.0,
            price: 1.2,
        }]
    }

    fn with_slot(slot_id: &str) -> OrderMetadata {
        OrderMetadata {
            phone: "549111".into(),
            slot_id: Some(slot_id.into()),
            ..Default::default()
        }
    }

    fn setup() -> (SlotReservingOrders, Arc<MemoryOrders>, Arc<FixedSlots>) {
        let inner = Arc::new(MemoryOrders::new(Arc::new(StaticCatalog::new(
            sample_products(),
        ))));
        let slots = Arc::new(FixedSlots::new(sample_slots()));
        (
            SlotReservingOrders::new(inner.clone(), slots.clone()),
            inner,
            slots,
        )
    }

    #[tokio::test]
    async fn reserves_the_slot_before_persisting() {
        let (orders, inner, slots) = setup();

        let order = orders.create_order(&cart(), &with_slot("slot-am")).await.unwrap();

        assert_eq!(inner.created()[0].id, order.id);
        assert_eq!(slots.remaining("slot-am"), Some(2));
    }

    #[tokio::test]
    async fn failed_persistence_releases_the_slot() {
        let (orders, inner, slots) = setup();
        inner.fail_next_create(ServiceError::Failed("db down".into()));

        let err = orders
            .create_order(&cart(), &with_slot("slot-am"))
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::Failed("db down".into()));
        assert_eq!(slots.remaining("slot-am"), Some(3));
        assert!(inner.created().is_empty());
    }

    #[tokio::test]
    async fn unknown_slot_is_unavailable_and_nothing_is_persisted() {
        let (orders, inner, _) = setup();

        let err = orders
            .create_order(&cart(), &with_slot("slot-night"))
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::SlotUnavailable("slot-night".into()));
        assert!(inner.created().is_empty());
    }

    #[tokio::test]
    async fn orders_without_slot_skip_reservation() {
        let (orders, inner, slots) = setup();
        let metadata = OrderMetadata {
            phone: "549111".into(),
            ..Default::default()
        };

        orders.create_order(&cart(), &metadata).await.unwrap();

        assert_eq!(inner.created().len(), 1);
        assert_eq!(slots.remaining("slot-am"), Some(3));
    }
}
