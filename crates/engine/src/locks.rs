//! Per-group mutual exclusion.
//!
//! Every mutation of a group's ledger runs while holding that group's lock,
//! from loading the edge snapshot to committing. Groups never share a lock,
//! and the map mutex is only held long enough to fetch the group's entry.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{EngineError, ResultEngine};

/// Held for the duration of one ledger operation.
pub type GroupGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub(crate) struct GroupLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl GroupLocks {
    /// Waits at most `timeout` for the group's lock, failing with
    /// [`EngineError::GroupBusy`] otherwise.
    pub(crate) async fn acquire(&self, group_id: &str, timeout: Duration) -> ResultEngine<GroupGuard> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(group_id.to_string()).or_default().clone()
        };

        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!("timed out after {timeout:?} waiting for group {group_id}");
                Err(EngineError::GroupBusy(group_id.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let locks = GroupLocks::default();
        let _held = locks.acquire("g1", Duration::from_millis(50)).await.unwrap();

        let err = locks
            .acquire("g1", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::GroupBusy("g1".to_string()));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn different_groups_do_not_contend() {
        let locks = GroupLocks::default();
        let _g1 = locks.acquire("g1", Duration::from_millis(50)).await.unwrap();
        assert!(locks.acquire("g2", Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let locks = GroupLocks::default();
        {
            let _held = locks.acquire("g1", Duration::from_millis(50)).await.unwrap();
        }
        assert!(locks.acquire("g1", Duration::from_millis(50)).await.is_ok());
    }
}
