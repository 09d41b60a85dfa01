//! Per-entity lock set for lifecycle operations.
//!
//! An identifier is either idle (absent) or locked (present). Acquiring a
//! locked identifier fails immediately; nothing is queued. The returned
//! guard releases its identifier on drop, so every exit path of an action,
//! including an early `?`, unlocks.

use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct OperationLockSet {
    locked: Arc<Mutex<HashSet<String>>>,
}

impl OperationLockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `id`, or fail with [`StoreError::ConcurrencyRejected`] if it is held.
    pub fn try_acquire(&self, id: &str) -> StoreResult<OperationGuard> {
        let mut locked = self.locked.lock();
        if !locked.insert(id.to_string()) {
            return Err(StoreError::ConcurrencyRejected(id.to_string()));
        }
        Ok(OperationGuard {
            locked: Arc::clone(&self.locked),
            id: id.to_string(),
        })
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.locked.lock().contains(id)
    }
}

/// Held for the duration of one lifecycle operation.
#[must_use]
#[derive(Debug)]
pub struct OperationGuard {
    locked: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.locked.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let locks = OperationLockSet::new();
        let guard = locks.try_acquire("p1").unwrap();
        assert!(locks.is_locked("p1"));

        let err = locks.try_acquire("p1").unwrap_err();
        assert_eq!(err, StoreError::ConcurrencyRejected("p1".to_string()));

        drop(guard);
        assert!(!locks.is_locked("p1"));
        assert!(locks.try_acquire("p1").is_ok());
    }

    #[test]
    fn distinct_ids_lock_independently() {
        let locks = OperationLockSet::new();
        let _a = locks.try_acquire("p1").unwrap();
        let _b = locks.try_acquire("p2").unwrap();
        assert!(locks.is_locked("p1"));
        assert!(locks.is_locked("p2"));
        assert!(!locks.is_locked("p3"));
    }
}
