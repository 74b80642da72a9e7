use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

type RecordKey = (u64, NaiveDate);

/// Per-(employee, date) mutexes serializing punches and the finalizer on one record.
///
/// The table has no size bound: evicting a mutex someone still waits on would let
/// the next caller build a fresh one for the same record. Entries only leave after
/// sitting idle, and every holder releases well within that window because store
/// calls and lock waits are themselves time-bounded.
#[derive(Clone)]
pub struct RecordLocks {
    locks: Cache<RecordKey, Arc<Mutex<()>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self {
            locks: Cache::builder()
                .time_to_idle(Duration::from_secs(15 * 60))
                .build(),
        }
    }

    pub async fn acquire(&self, employee_id: u64, date: NaiveDate) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with((employee_id, date), async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}

impl Default for RecordLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_record_is_exclusive_other_records_are_not() {
        let locks = RecordLocks::new();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let held = locks.acquire(7, day).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(7, day)).await;
        assert!(blocked.is_err());

        let other =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(8, day)).await;
        assert!(other.is_ok());

        drop(held);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(7, day)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn held_lock_survives_a_flood_of_other_records() {
        let locks = RecordLocks::new();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let held = locks.acquire(1, day).await;
        for employee_id in 2..5_000 {
            drop(locks.acquire(employee_id, day).await);
        }
        locks.locks.run_pending_tasks().await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(1, day)).await;
        assert!(blocked.is_err());
        drop(held);
    }
}
