//! `SlotService` backed by the optimistic slot reservations of the db crate.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use db::{DbError, DeliverySlot, SlotReservations};
use nodes::services::{SlotOption, SlotService};
use nodes::ServiceError;

pub struct ReservingSlotService {
    reservations: SlotReservations,
}

impl ReservingSlotService {
    pub fn new(reservations: SlotReservations) -> Self {
        Self { reservations }
    }
}

fn slot_option(slot: DeliverySlot) -> SlotOption {
    SlotOption {
        id: slot.id.to_string(),
        date: slot.date,
        time_start: slot.time_start,
        time_end: slot.time_end,
        remaining: slot.remaining(),
    }
}

fn service_error(e: DbError) -> ServiceError {
    ServiceError::Failed(e.to_string())
}

#[async_trait]
impl SlotService for ReservingSlotService {
    async fn get_available_slots(&self) -> Result<Vec<SlotOption>, ServiceError> {
        let slots = self
            .reservations
            .available_slots()
            .await
            .map_err(service_error)?;
        Ok(slots.into_iter().map(slot_option).collect())
    }

    async fn reserve_slot(&self, id: &str) -> Result<bool, ServiceError> {
        let Ok(slot_id) = Uuid::parse_str(id) else {
            warn!(%id, "not a slot id");
            return Ok(false);
        };
        self.reservations
            .reserve_slot(slot_id)
            .await
            .map_err(service_error)
    }

    async fn release_slot(&self, id: &str) -> Result<(), ServiceError> {
        let Ok(slot_id) = Uuid::parse_str(id) else {
            warn!(%id, "not a slot id");
            return Ok(());
        };
        self.reservations
            .release_slot(slot_id)
            .await
            .map(|_| ())
            .map_err(service_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use db::memory::MemorySlotRepository;
    use db::{RetryPolicy, SlotRepository};
    use std::sync::Arc;

    #[tokio::test]
    async fn lists_reserves_and_releases_by_string_id() {
        let slot = DeliverySlot {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 10, 24).unwrap(),
            time_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            time_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            max_orders: 2,
            orders_count: 1,
            version: 0,
        };
        let repo = Arc::new(MemorySlotRepository::new(vec![slot.clone()]));
        let service = ReservingSlotService::new(SlotReservations::new(
            repo.clone(),
            RetryPolicy::default(),
        ));

        let options = service.get_available_slots().await.unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].remaining, 1);
        assert_eq!(options[0].label(), "24/10 09:00-12:00");

        let id = slot.id.to_string();
        assert!(service.reserve_slot(&id).await.unwrap());
        assert!(!service.reserve_slot(&id).await.unwrap());
        assert!(service.get_available_slots().await.unwrap().is_empty());

        service.release_slot(&id).await.unwrap();
        assert_eq!(repo.get_slot(slot.id).await.unwrap().unwrap().orders_count, 1);

        assert!(!service.reserve_slot("slot-am").await.unwrap());
    }
}
