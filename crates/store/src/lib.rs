//! StageCentral Identity Store
//!
//! The document store seen by the identity core:
//! - [`IdentityStore`]: find/update primitives over the `users` and `config`
//!   collections, including the atomic compare-and-set on `last_pid`
//! - [`MemoryStore`]: in-process implementation, optionally persisted as a
//!   checksummed snapshot file
//! - [`with_retries`]: bounded retry for transient store failures

#![deny(unsafe_code)]

pub mod memory;
pub mod snapshot;

use stagecentral_identity::{Account, LastIds, Pid};
use thiserror::Error;
use tracing::warn;

pub use memory::MemoryStore;
pub use snapshot::{read_snapshot, write_snapshot};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Errors
// ============================================================================

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or temporarily failing; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An account with this username already exists.
    #[error("duplicate username: {0}")]
    DuplicateUsername(String),

    /// An account with this pid already exists.
    #[error("duplicate pid: {0}")]
    DuplicatePid(Pid),

    /// The singleton config document is missing.
    #[error("config document missing")]
    MissingConfig,

    /// Snapshot file I/O failed.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot bytes are not a valid snapshot.
    #[error("snapshot decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Snapshot decoded but a document is invalid.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Snapshot digest does not match its contents.
    #[error("snapshot checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Find/update primitives over the `users` and `config` collections.
///
/// Implementations MUST be safe to share between concurrently running calls.
/// Updates keyed by a username or pid that matches nothing are no-ops and
/// report `0` matched documents, not an error.
pub trait IdentityStore: Send + Sync {
    fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    fn find_account_by_pid(&self, pid: Pid) -> StoreResult<Option<Account>>;

    /// Insert a new account. Fails with `DuplicateUsername`/`DuplicatePid`
    /// if either key is taken.
    fn insert_account(&self, account: Account) -> StoreResult<()>;

    /// Set both station URLs of the account named `username`.
    fn update_station_urls(
        &self,
        username: &str,
        station_url: &str,
        int_station_url: &str,
    ) -> StoreResult<u64>;

    /// Set `sids`/`usids` of the account owning `pid`.
    fn update_song_list(&self, pid: Pid, sids: &str, usids: &str) -> StoreResult<u64>;

    /// Read the singleton config document.
    fn load_config(&self) -> StoreResult<LastIds>;

    /// Atomically set `last_pid = new` if it currently equals `expected`.
    ///
    /// Returns `false` (and writes nothing) when another writer got there
    /// first. The other counters are left untouched.
    fn compare_and_set_last_pid(&self, expected: Pid, new: Pid) -> StoreResult<bool>;
}

// ============================================================================
// Retry
// ============================================================================

/// Run `op`, retrying transient failures up to `max_retries` extra times.
///
/// Non-transient errors are returned immediately.
pub fn with_retries<T>(
    what: &str,
    max_retries: u32,
    mut op: impl FnMut() -> StoreResult<T>,
) -> StoreResult<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(operation = what, attempt, error = %e, "Transient store failure, retrying");
            }
            result => return result,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
