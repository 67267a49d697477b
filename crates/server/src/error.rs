//! Error types for the account and JSON services.

use stagecentral_store::StoreError;
use thiserror::Error;

/// Failure of an account provisioning call.
///
/// Every variant aborts the call and is reported to the client as an
/// operational error.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("PID space exhausted")]
    PidExhausted,

    #[error("PID allocation lost the counter race {attempts} times")]
    AllocationContention { attempts: u32 },

    #[error("account {username} not found after insert")]
    AccountVanished { username: String },
}

/// Failure of a JSON service call.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no JSON service registered for path {0}")]
    UnknownPath(String),

    #[error("malformed request: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}
