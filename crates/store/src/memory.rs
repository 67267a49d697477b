//! In-process identity store.
//!
//! Both collections live behind one mutex, so every trait operation is atomic
//! with respect to every other.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use stagecentral_identity::{Account, LastIds, Pid};
use stagecentral_wire::{AccountDocument, SNAPSHOT_FORMAT_VERSION, StoreSnapshot};
use tracing::debug;

use crate::snapshot::{read_snapshot, write_snapshot};
use crate::{IdentityStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Collections {
    /// Keyed by username.
    users: BTreeMap<String, Account>,
    config: LastIds,
}

/// In-memory `users` + `config` store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    /// Empty store with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store seeded with the given counters.
    pub fn with_config(config: LastIds) -> Self {
        Self {
            inner: Mutex::new(Collections {
                users: BTreeMap::new(),
                config,
            }),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Collections>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    /// Number of stored accounts.
    pub fn account_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.users.len())
    }

    /// Build a snapshot of both collections, accounts ordered by pid.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let inner = self.lock()?;
        let mut users: Vec<AccountDocument> =
            inner.users.values().cloned().map(Into::into).collect();
        users.sort_by_key(|u| u.pid);
        Ok(StoreSnapshot {
            snapshot_format_version: SNAPSHOT_FORMAT_VERSION,
            config: Some(inner.config.into()),
            users,
        })
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        if snapshot.snapshot_format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::InvalidDocument(format!(
                "unsupported snapshot version {}",
                snapshot.snapshot_format_version
            )));
        }
        let config: LastIds = snapshot.config.ok_or(StoreError::MissingConfig)?.into();
        let store = Self::with_config(config);
        for doc in snapshot.users {
            let account =
                Account::try_from(doc).map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
            store.insert_account(account)?;
        }
        Ok(store)
    }

    /// Persist both collections to `path`.
    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let snapshot = self.snapshot()?;
        write_snapshot(&snapshot, path)?;
        debug!(path = %path.display(), users = snapshot.users.len(), "Store snapshot written");
        Ok(())
    }

    /// Load a store previously written with [`MemoryStore::save_snapshot`].
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        Self::from_snapshot(read_snapshot(path)?)
    }
}

impl IdentityStore for MemoryStore {
    fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        Ok(self.lock()?.users.get(username).cloned())
    }

    fn find_account_by_pid(&self, pid: Pid) -> StoreResult<Option<Account>> {
        Ok(self.lock()?.users.values().find(|a| a.pid == pid).cloned())
    }

    fn insert_account(&self, account: Account) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.users.contains_key(&account.username) {
            return Err(StoreError::DuplicateUsername(account.username));
        }
        if inner.users.values().any(|a| a.pid == account.pid) {
            return Err(StoreError::DuplicatePid(account.pid));
        }
        inner.users.insert(account.username.clone(), account);
        Ok(())
    }

    fn update_station_urls(
        &self,
        username: &str,
        station_url: &str,
        int_station_url: &str,
    ) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        match inner.users.get_mut(username) {
            Some(account) => {
                account.station_url = station_url.to_string();
                account.int_station_url = int_station_url.to_string();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn update_song_list(&self, pid: Pid, sids: &str, usids: &str) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        match inner.users.values_mut().find(|a| a.pid == pid) {
            Some(account) => {
                account.sids = sids.to_string();
                account.usids = usids.to_string();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn load_config(&self) -> StoreResult<LastIds> {
        Ok(self.lock()?.config)
    }

    fn compare_and_set_last_pid(&self, expected: Pid, new: Pid) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if inner.config.last_pid != expected {
            return Ok(false);
        }
        inner.config.last_pid = new;
        Ok(true)
    }
}
