//! Per-resource mutual exclusion for action handlers.
//!
//! Each message id gets its own lock, created lazily on first use. Actions on
//! the same message run one at a time; actions on different messages never
//! wait on each other. Entries are kept for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use sigil_core::MessageId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ResourceGuard {
    locks: Mutex<HashMap<MessageId, Arc<Mutex<()>>>>,
}

impl ResourceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `resource`. Released when the guard drops.
    pub async fn acquire(&self, resource: MessageId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(resource).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of resources that have ever been locked.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_resource_is_serialized() {
        let guard = Arc::new(ResourceGuard::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _held = guard.acquire(7).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(guard.tracked().await, 1);
    }

    #[tokio::test]
    async fn test_different_resources_do_not_block() {
        let guard = ResourceGuard::new();
        let _a = guard.acquire(1).await;
        let b = tokio::time::timeout(Duration::from_millis(200), guard.acquire(2)).await;
        assert!(b.is_ok());
        assert_eq!(guard.tracked().await, 2);
    }

    #[tokio::test]
    async fn test_released_on_drop() {
        let guard = ResourceGuard::new();
        {
            let _held = guard.acquire(3).await;
        }
        let again = tokio::time::timeout(Duration::from_millis(200), guard.acquire(3)).await;
        assert!(again.is_ok());
    }
}
