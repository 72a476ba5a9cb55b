//! Delivery slot reservation over optimistic locking.
//!
//! Both directions go through [`retry_optimistic`]: read the slot, check the
//! capacity precondition, then `compare_and_set_orders` against the version
//! that was read. A full slot and a lost race both surface as `false`.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::DeliverySlot;
use crate::optimistic::{retry_optimistic, Attempt, Outcome, RetryPolicy};
use crate::repository::SlotRepository;
use crate::DbError;

#[derive(Clone)]
pub struct SlotReservations {
    repo: Arc<dyn SlotRepository>,
    policy: RetryPolicy,
}

impl SlotReservations {
    pub fn new(repo: Arc<dyn SlotRepository>, policy: RetryPolicy) -> Self {
        Self { repo, policy }
    }

    /// Slots with spare capacity, ordered by date and start time.
    pub async fn available_slots(&self) -> Result<Vec<DeliverySlot>, DbError> {
        Ok(self
            .repo
            .list_slots()
            .await?
            .into_iter()
            .filter(DeliverySlot::has_capacity)
            .collect())
    }

    /// Take one unit of capacity. `false` if the slot is missing, full, or
    /// every attempt lost a race.
    #[instrument(skip(self))]
    pub async fn reserve_slot(&self, slot_id: Uuid) -> Result<bool, DbError> {
        let outcome = retry_optimistic(&self.policy, move |_| async move {
            let Some(slot) = self.repo.get_slot(slot_id).await? else {
                return Ok(Attempt::Abort);
            };
            if !slot.has_capacity() {
                return Ok(Attempt::Abort);
            }
            let rows = self
                .repo
                .compare_and_set_orders(slot_id, slot.version, slot.orders_count + 1)
                .await?;
            Ok::<_, DbError>(if rows == 1 {
                Attempt::Commit(slot.orders_count + 1)
            } else {
                Attempt::Conflict
            })
        })
        .await?;

        Ok(self.settle(outcome, "reserve"))
    }

    /// Give back one unit of capacity. Version-guarded like
    /// [`reserve_slot`](Self::reserve_slot); a slot with no orders is left
    /// untouched and yields `false`.
    #[instrument(skip(self))]
    pub async fn release_slot(&self, slot_id: Uuid) -> Result<bool, DbError> {
        let outcome = retry_optimistic(&self.policy, move |_| async move {
            let Some(slot) = self.repo.get_slot(slot_id).await? else {
                return Ok(Attempt::Abort);
            };
            if slot.orders_count <= 0 {
                return Ok(Attempt::Abort);
            }
            let rows = self
                .repo
                .compare_and_set_orders(slot_id, slot.version, slot.orders_count - 1)
                .await?;
            Ok::<_, DbError>(if rows == 1 {
                Attempt::Commit(slot.orders_count - 1)
            } else {
                Attempt::Conflict
            })
        })
        .await?;

        Ok(self.settle(outcome, "release"))
    }

    fn settle(&self, outcome: Outcome<i32>, action: &str) -> bool {
        match outcome {
            Outcome::Committed(orders_count) => {
                info!(action, orders_count, "slot updated");
                true
            }
            Outcome::Aborted => {
                info!(action, "slot precondition not met");
                false
            }
            Outcome::Exhausted => {
                warn!(
                    action,
                    attempts = self.policy.max_attempts,
                    "slot contention: giving up"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySlotRepository;
    use chrono::{NaiveDate, NaiveTime};
    use std::time::Duration;

    fn slot(max_orders: i32, orders_count: i32) -> DeliverySlot {
        DeliverySlot {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 10, 24).unwrap(),
            time_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            time_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            max_orders,
            orders_count,
            version: 0,
        }
    }

    fn reservations(slots: Vec<DeliverySlot>) -> (SlotReservations, Arc<MemorySlotRepository>) {
        let repo = Arc::new(MemorySlotRepository::new(slots));
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::from_millis(2),
        };
        (SlotReservations::new(repo.clone(), policy), repo)
    }

    #[tokio::test]
    async fn full_slot_is_refused_and_unchanged() {
        let full = slot(1, 1);
        let (reservations, repo) = reservations(vec![full.clone()]);

        assert!(!reservations.reserve_slot(full.id).await.unwrap());

        let stored = repo.get_slot(full.id).await.unwrap().unwrap();
        assert_eq!(stored.orders_count, 1);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn reserve_increments_count_and_version() {
        let empty = slot(5, 0);
        let (reservations, repo) = reservations(vec![empty.clone()]);

        assert!(reservations.reserve_slot(empty.id).await.unwrap());

        let stored = repo.get_slot(empty.id).await.unwrap().unwrap();
        assert_eq!(stored.orders_count, 1);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn unknown_slot_is_refused() {
        let (reservations, _) = reservations(Vec::new());
        assert!(!reservations.reserve_slot(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn release_is_version_guarded_and_floors_at_zero() {
        let taken = slot(2, 1);
        let (reservations, repo) = reservations(vec![taken.clone()]);

        assert!(reservations.release_slot(taken.id).await.unwrap());
        assert!(!reservations.release_slot(taken.id).await.unwrap());

        let stored = repo.get_slot(taken.id).await.unwrap().unwrap();
        assert_eq!(stored.orders_count, 0);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn available_slots_skips_full_ones() {
        let open = slot(2, 1);
        let (reservations, _) = reservations(vec![open.clone(), slot(1, 1)]);

        let available = reservations.available_slots().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, open.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_overbook() {
        let capacity = 3;
        let target = slot(capacity, 0);
        let id = target.id;
        let (reservations, repo) = reservations(vec![target]);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let reservations = reservations.clone();
                tokio::spawn(async move { reservations.reserve_slot(id).await })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, capacity);
        let stored = repo.get_slot(id).await.unwrap().unwrap();
        assert_eq!(stored.orders_count, capacity);
        assert_eq!(stored.version, i64::from(capacity));
    }
}
