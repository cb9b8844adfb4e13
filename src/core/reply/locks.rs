//! Per-batch-name mutual exclusion for reply application

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes reply handling per batch name while distinct names proceed in parallel
///
/// An entry lives only while some task holds or waits for its lock.
#[derive(Debug, Default)]
pub struct BatchLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one batch name
#[derive(Debug)]
#[must_use = "the batch is unlocked as soon as the guard drops"]
pub struct BatchGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of 1 means the map is the last owner
        self.locks
            .remove_if(&self.name, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl BatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `name`; released when the guard drops
    pub async fn lock(&self, name: &str) -> BatchGuard<'_> {
        // The map shard must not stay locked across the await
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        BatchGuard {
            locks: &self.locks,
            name: name.to_string(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_exclusive() {
        let locks = BatchLocks::new();
        let guard = locks.lock("BATCH_001").await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.lock("BATCH_001")).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(50), locks.lock("BATCH_001")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_names_do_not_block() {
        let locks = BatchLocks::new();
        let _a = locks.lock("BATCH_001").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock("BATCH_002")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_released_with_last_guard() {
        let locks = Arc::new(BatchLocks::new());
        for i in 0..10 {
            let _guard = locks.lock(&format!("BATCH_{i:03}")).await;
        }
        assert!(locks.is_empty());

        // A waiting task keeps the entry alive after the holder lets go
        let first = locks.lock("BATCH_001").await;
        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("BATCH_001").await;
                locks.len()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);
        assert_eq!(locks.len(), 1);

        assert_eq!(waiter.await.unwrap(), 1);
        assert!(locks.is_empty());
    }
}
