//! Per-phone serialization.
//!
//! Messages from one correspondent are handled one at a time so the
//! read-modify-write of their execution never interleaves. Entries are
//! dropped as soon as nobody holds or waits on them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

#[derive(Default, Clone)]
pub struct PhoneLocks {
    locks: Arc<LockMap>,
}

impl PhoneLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task holds `phone`, then hold it until the guard
    /// is dropped.
    pub async fn lock(&self, phone: &str) -> PhoneGuard {
        let mutex = self
            .locks
            .entry(phone.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        PhoneGuard {
            phone: phone.to_owned(),
            locks: self.locks.clone(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    /// Number of phones currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct PhoneGuard {
    phone: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PhoneGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits.
        self.locks
            .remove_if(&self.phone, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn same_phone_is_serialized() {
        let locks = PhoneLocks::new();
        let first = locks.lock("549111").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("549111").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_phones_do_not_block_each_other() {
        let locks = PhoneLocks::new();
        let _a = locks.lock("549111").await;
        let _b = locks.lock("549222").await;
        assert_eq!(locks.len(), 2);
    }
}
