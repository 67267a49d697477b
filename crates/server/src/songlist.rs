//! Available-songs sync (`misc/sync_available_songs`).
//!
//! Authorization only compares the listed PIDs against the caller's
//! transport-assigned PID; nothing is read from the store first. Under the
//! default [`SongSyncPolicy::First`] only the first PID is checked, so a
//! client may append PIDs it does not own.

use std::sync::Arc;

use stagecentral_identity::Pid;
use stagecentral_store::{IdentityStore, with_retries};
use stagecentral_wire::{
    SyncAvailableSongsRequest, SyncAvailableSongsResponse, marshal_response, unmarshal_request,
};
use tracing::{debug, error, warn};

use crate::config::SongSyncPolicy;
use crate::dispatch::JsonService;
use crate::error::ServiceError;
use crate::session::ClientSession;

pub const SYNC_AVAILABLE_SONGS_PATH: &str = "misc/sync_available_songs";

/// Result of a sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every listed account was updated.
    Accepted,
    /// An update failed; PIDs before it keep their new values.
    Failed { failed_pid: Pid },
    /// The caller does not own the listed PIDs; nothing was written.
    Rejected,
}

impl SyncOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Wire result code: 1 on success, 0 otherwise.
    pub fn ret_code(&self) -> i32 {
        if self.accepted() { 1 } else { 0 }
    }
}

pub struct SongListSync {
    store: Arc<dyn IdentityStore>,
    policy: SongSyncPolicy,
    max_store_retries: u32,
}

impl SongListSync {
    pub fn new(store: Arc<dyn IdentityStore>, policy: SongSyncPolicy, max_store_retries: u32) -> Self {
        Self {
            store,
            policy,
            max_store_retries,
        }
    }

    fn authorized(&self, caller_pid: Pid, pids: &[Pid]) -> bool {
        match (self.policy, pids.first()) {
            (_, None) => false,
            (SongSyncPolicy::First, Some(&first)) => first == caller_pid,
            (SongSyncPolicy::All, Some(_)) => pids.iter().all(|&pid| pid == caller_pid),
        }
    }

    /// Store `sids`/`usids` on every account in `pids`.
    pub fn sync(&self, caller_pid: Pid, pids: &[Pid], sids: &str, usids: &str) -> SyncOutcome {
        if !self.authorized(caller_pid, pids) {
            warn!(
                caller_pid,
                ?pids,
                "Client-supplied PID did not match server-assigned PID, rejecting songlist sync"
            );
            return SyncOutcome::Rejected;
        }

        for &pid in pids {
            let result = with_retries("update_song_list", self.max_store_retries, || {
                self.store.update_song_list(pid, sids, usids)
            });
            match result {
                Ok(matched) => debug!(pid, matched, "Updated songlist"),
                Err(e) => {
                    error!(pid, error = %e, "Could not update songlist");
                    return SyncOutcome::Failed { failed_pid: pid };
                }
            }
        }

        SyncOutcome::Accepted
    }
}

impl JsonService for SongListSync {
    fn path(&self) -> &'static str {
        SYNC_AVAILABLE_SONGS_PATH
    }

    fn handle(&self, data: &str, session: &ClientSession) -> Result<String, ServiceError> {
        let req: SyncAvailableSongsRequest =
            unmarshal_request(data).map_err(ServiceError::MalformedRequest)?;

        let outcome = self.sync(session.pid(), &req.pids, &req.sids, &req.usids);

        marshal_response(
            self.path(),
            vec![SyncAvailableSongsResponse {
                ret_code: outcome.ret_code(),
            }],
        )
        .map_err(ServiceError::Encode)
    }
}
