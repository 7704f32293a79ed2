//! Per-source-pool advisory locks
//!
//! Dispatch holds shared locks on the pools its recipients came from; a duplicate merge takes
//! exclusive locks on the pools it retires contacts from. The two can therefore never touch the
//! same pool at the same time. Locks are always taken in rank order so two callers asking for
//! overlapping sets cannot deadlock.

use crate::error::{Error, Result};
use crate::types::SourcePool;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Shared guard held by a dispatch run; released on drop
#[derive(Debug)]
pub struct PoolReadGuard {
    _guards: Vec<OwnedRwLockReadGuard<()>>,
}

/// Exclusive guard held by a merge; released on drop
#[derive(Debug)]
pub struct PoolWriteGuard {
    pools: Vec<SourcePool>,
    _guards: Vec<OwnedRwLockWriteGuard<()>>,
}

impl PoolWriteGuard {
    /// Pools covered by this guard
    pub fn pools(&self) -> &[SourcePool] {
        &self.pools
    }
}

/// Lock table with one read/write lock per source pool
#[derive(Clone, Debug)]
pub struct PoolLocks {
    locks: Arc<HashMap<SourcePool, Arc<RwLock<()>>>>,
}

impl Default for PoolLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolLocks {
    /// Create a lock for every known pool
    pub fn new() -> Self {
        let locks = SourcePool::ALL
            .into_iter()
            .map(|pool| (pool, Arc::new(RwLock::new(()))))
            .collect();
        Self {
            locks: Arc::new(locks),
        }
    }

    fn ordered(pools: impl IntoIterator<Item = SourcePool>) -> BTreeSet<SourcePool> {
        pools.into_iter().collect()
    }

    fn lock_for(&self, pool: SourcePool) -> Arc<RwLock<()>> {
        // Every variant is inserted in `new`, the fallback only guards against future variants
        self.locks
            .get(&pool)
            .cloned()
            .unwrap_or_else(|| Arc::new(RwLock::new(())))
    }

    /// Take shared locks on `pools`, waiting for any running merge to finish
    pub async fn read(&self, pools: impl IntoIterator<Item = SourcePool>) -> PoolReadGuard {
        let mut guards = Vec::new();
        for pool in Self::ordered(pools) {
            guards.push(self.lock_for(pool).read_owned().await);
        }
        PoolReadGuard { _guards: guards }
    }

    /// Take exclusive locks on `pools`, failing with [`Error::PoolBusy`] after `timeout`
    pub async fn write(
        &self,
        pools: impl IntoIterator<Item = SourcePool>,
        timeout: Duration,
    ) -> Result<PoolWriteGuard> {
        let ordered: Vec<SourcePool> = Self::ordered(pools).into_iter().collect();
        let acquire = async {
            let mut guards = Vec::with_capacity(ordered.len());
            for pool in &ordered {
                guards.push(self.lock_for(*pool).write_owned().await);
            }
            guards
        };

        match tokio::time::timeout(timeout, acquire).await {
            Ok(guards) => Ok(PoolWriteGuard {
                pools: ordered,
                _guards: guards,
            }),
            Err(_) => {
                let names: Vec<&str> = ordered.iter().map(|p| p.as_str()).collect();
                tracing::warn!(
                    pools = ?names,
                    timeout_secs = timeout.as_secs(),
                    "Timed out waiting for active dispatch to release source pools"
                );
                Err(Error::PoolBusy(format!(
                    "pools [{}] are in use by an active dispatch",
                    names.join(", ")
                )))
            }
        }
    }
}
