//! Store wrapper with injectable failures.

use std::collections::HashMap;
use std::sync::Mutex;

use stagecentral_identity::{Account, LastIds, Pid};
use stagecentral_store::{IdentityStore, MemoryStore, StoreError, StoreResult};

/// Failure budget meaning "fail forever".
pub const ALWAYS: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Fault {
    /// Calls to let through before failing.
    skip: u32,
    /// Calls to fail after that.
    times: u32,
}

/// Delegates to a [`MemoryStore`], failing chosen operations with
/// `Unavailable`. Keys are operation names, or `update_song_list:<pid>`.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    faults: Mutex<HashMap<String, Fault>>,
    cas_always_loses: Mutex<bool>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Fail the next `times` calls of `op`.
    pub fn fail(&self, op: &str, times: u32) {
        self.fail_after(op, 0, times);
    }

    /// Let `skip` calls of `op` through, then fail the next `times`.
    pub fn fail_after(&self, op: &str, skip: u32, times: u32) {
        self.faults
            .lock()
            .unwrap()
            .insert(op.to_string(), Fault { skip, times });
    }

    /// Make every compare-and-set report a lost race.
    pub fn lose_every_cas(&self) {
        *self.cas_always_loses.lock().unwrap() = true;
    }

    fn check(&self, op: &str) -> StoreResult<()> {
        let mut faults = self.faults.lock().unwrap();
        let Some(fault) = faults.get_mut(op) else {
            return Ok(());
        };
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        if fault.times == 0 {
            return Ok(());
        }
        if fault.times != ALWAYS {
            fault.times -= 1;
        }
        Err(StoreError::Unavailable(format!("injected failure in {op}")))
    }
}

impl IdentityStore for FaultyStore {
    fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        self.check("find_account_by_username")?;
        self.inner.find_account_by_username(username)
    }

    fn find_account_by_pid(&self, pid: Pid) -> StoreResult<Option<Account>> {
        self.check("find_account_by_pid")?;
        self.inner.find_account_by_pid(pid)
    }

    fn insert_account(&self, account: Account) -> StoreResult<()> {
        self.check("insert_account")?;
        self.inner.insert_account(account)
    }

    fn update_station_urls(
        &self,
        username: &str,
        station_url: &str,
        int_station_url: &str,
    ) -> StoreResult<u64> {
        self.check("update_station_urls")?;
        self.inner
            .update_station_urls(username, station_url, int_station_url)
    }

    fn update_song_list(&self, pid: Pid, sids: &str, usids: &str) -> StoreResult<u64> {
        self.check("update_song_list")?;
        self.check(&format!("update_song_list:{pid}"))?;
        self.inner.update_song_list(pid, sids, usids)
    }

    fn load_config(&self) -> StoreResult<LastIds> {
        self.check("load_config")?;
        self.inner.load_config()
    }

    fn compare_and_set_last_pid(&self, expected: Pid, new: Pid) -> StoreResult<bool> {
        self.check("compare_and_set_last_pid")?;
        if *self.cas_always_loses.lock().unwrap() {
            return Ok(false);
        }
        self.inner.compare_and_set_last_pid(expected, new)
    }
}
