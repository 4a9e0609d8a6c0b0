//! Per-record lock manager
//!
//! Every account (and, in the loan crate, every loan) is an independently
//! lockable resource. Mutations on the same record serialize through its
//! async mutex; operations on different records proceed in parallel.
//! Acquisition is bounded by a timeout and surfaced as a retryable
//! [`Error::LockTimeout`], never a hang.
//!
//! Two-record acquisition (transfers) always locks in ascending key order,
//! so opposing transfers on the same pair cannot deadlock.
//!
//! Entries are created on first touch; once the table grows past a
//! threshold, unreferenced entries are swept out so its size tracks the
//! working set, not every record ever locked.

use crate::{error::Error, types::AccountId, Result};
use dashmap::DashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Duration};

/// Held lock on a single record
#[derive(Debug)]
pub struct ResourceGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Held locks on a record pair
#[derive(Debug)]
pub struct PairGuard {
    _first: OwnedMutexGuard<()>,
    _second: OwnedMutexGuard<()>,
}

/// Lock table keyed by record ID
#[derive(Debug)]
pub struct ResourceLocks<K>
where
    K: Eq + Hash + Ord + Copy + Display + std::fmt::Debug,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
    acquire_timeout: Duration,
}

/// Lock table for accounts
pub type AccountLocks = ResourceLocks<AccountId>;

/// Table size at which unreferenced entries are swept out
const SWEEP_THRESHOLD: usize = 1024;

impl<K> ResourceLocks<K>
where
    K: Eq + Hash + Ord + Copy + Display + std::fmt::Debug,
{
    /// Create a lock table with the given acquisition bound
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            acquire_timeout,
        }
    }

    fn entry(&self, key: K) -> Arc<Mutex<()>> {
        if self.locks.len() > SWEEP_THRESHOLD {
            // strong_count == 1 means only the table holds the mutex: no
            // guard is out and no acquirer is waiting, so dropping the entry
            // cannot break serialization. Holders cloned their Arc under the
            // shard lock and keep the count above 1.
            self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for one record
    pub async fn acquire(&self, key: K) -> Result<ResourceGuard> {
        let lock = self.entry(key);
        let guard = timeout(self.acquire_timeout, lock.lock_owned())
            .await
            .map_err(|_| Error::LockTimeout(key.to_string()))?;

        Ok(ResourceGuard { _guard: guard })
    }

    /// Acquire both locks of a pair in ascending key order
    ///
    /// The caller passes the keys in any order; the guard covers both.
    /// Keys must differ (transfer-to-self is rejected earlier).
    pub async fn acquire_pair(&self, a: K, b: K) -> Result<PairGuard> {
        debug_assert_ne!(a, b);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };

        let lo_lock = self.entry(lo);
        let first = timeout(self.acquire_timeout, lo_lock.lock_owned())
            .await
            .map_err(|_| Error::LockTimeout(lo.to_string()))?;

        let hi_lock = self.entry(hi);
        let second = timeout(self.acquire_timeout, hi_lock.lock_owned())
            .await
            .map_err(|_| Error::LockTimeout(hi.to_string()))?;

        Ok(PairGuard {
            _first: first,
            _second: second,
        })
    }
}
