use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-order async mutexes. Shared by the orchestrator and the reconciler so
/// admin updates, cancellations and syncs on one order run one at a time,
/// while different orders never wait on each other.
#[derive(Clone, Default)]
pub struct OrderLocks {
    inner: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

pub struct OrderGuard {
    _guard: OwnedMutexGuard<()>,
    id: Uuid,
    locks: OrderLocks,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: Uuid) -> OrderGuard {
        let mutex = self
            .inner
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        OrderGuard {
            _guard: guard,
            id,
            locks: self.clone(),
        }
    }

    /// Number of orders with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        // Drop the map entry once nobody else holds or waits on it. The map
        // itself owns one reference.
        self.locks
            .inner
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}
