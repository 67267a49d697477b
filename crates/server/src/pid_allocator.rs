//! PID allocation.
//!
//! `last_pid` in the config document is the only source of PID uniqueness.
//! Allocation is serialised in-process by the cache mutex and made atomic
//! against other processes by the store's compare-and-set, so two callers can
//! never persist the same `last_pid + 1`.

use std::sync::{Arc, Mutex, MutexGuard};

use stagecentral_identity::{LastIds, Pid};
use stagecentral_store::{IdentityStore, with_retries};
use tracing::{debug, info, warn};

use crate::error::ProvisionError;

pub struct PidAllocator {
    store: Arc<dyn IdentityStore>,
    /// Mirror of the config counters. Holding the lock makes the caller the
    /// single in-process writer of `last_pid`.
    cache: Mutex<LastIds>,
    max_attempts: u32,
    max_store_retries: u32,
}

impl PidAllocator {
    pub fn new(store: Arc<dyn IdentityStore>, max_attempts: u32, max_store_retries: u32) -> Self {
        Self {
            store,
            cache: Mutex::new(LastIds::default()),
            max_attempts,
            max_store_retries,
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, LastIds> {
        // Plain counters; a panicked holder cannot leave them half-written.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the cached counters.
    pub fn cached(&self) -> LastIds {
        *self.lock_cache()
    }

    /// Reload the cache from the config document.
    ///
    /// The store is read without holding the cache lock, so a refresh never
    /// waits on an allocation in progress. A read older than the cache (an
    /// allocation finished in between) is dropped.
    pub fn refresh(&self) -> Result<LastIds, ProvisionError> {
        let ids = with_retries("load_config", self.max_store_retries, || {
            self.store.load_config()
        })?;
        let mut cache = self.lock_cache();
        if ids.last_pid >= cache.last_pid {
            *cache = ids;
        }
        Ok(ids)
    }

    /// Allocate the next PID and persist it as `last_pid`.
    ///
    /// The cache only changes once the store has accepted the new value; on
    /// any error `last_pid` is left as it was.
    pub fn allocate(&self) -> Result<Pid, ProvisionError> {
        let mut cache = self.lock_cache();

        for attempt in 1..=self.max_attempts {
            let current = with_retries("load_config", self.max_store_retries, || {
                self.store.load_config()
            })?;
            let next = current.next_pid().ok_or(ProvisionError::PidExhausted)?;

            let won = with_retries("compare_and_set_last_pid", self.max_store_retries, || {
                self.store.compare_and_set_last_pid(current.last_pid, next)
            })?;

            if won {
                *cache = current.with_last_pid(next);
                info!(pid = next, "Allocated PID");
                return Ok(next);
            }
            debug!(attempt, expected = current.last_pid, "last_pid moved underneath us");
        }

        warn!(attempts = self.max_attempts, "Giving up on PID allocation");
        Err(ProvisionError::AllocationContention {
            attempts: self.max_attempts,
        })
    }
}
