//! Per-session mutual exclusion.
//!
//! Completion detection, assembly and the status flip for one session run
//! under that session's lock. Sessions never block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockTable = HashMap<Uuid, Arc<AsyncMutex<()>>>;

/// Table of async locks keyed by session id.
///
/// Entries are created on demand and dropped once no task holds or waits
/// for them.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    table: Arc<Mutex<LockTable>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to a session.
    pub async fn acquire(&self, session_id: Uuid) -> SessionGuard {
        let lock = self.table().entry(session_id).or_default().clone();
        let guard = lock.lock_owned().await;
        SessionGuard {
            session_id,
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    /// Number of sessions currently tracked.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one session, released on drop.
#[derive(Debug)]
pub struct SessionGuard {
    session_id: Uuid,
    table: Arc<Mutex<LockTable>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Release first so the table entry is the only remaining reference
        // when nobody else is waiting.
        drop(self.guard.take());

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = table.get(&self.session_id) {
            if Arc::strong_count(lock) == 1 {
                table.remove(&self.session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_pruned_after_release() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await;
        assert_eq!(locks.len(), 1);
        drop(guard);

        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_block() {
        let locks = SessionLocks::new();

        let _a = locks.acquire(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(Uuid::new_v4())).await;

        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_session_is_exclusive() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}
