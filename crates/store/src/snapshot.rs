//! Snapshot file I/O.
//!
//! File layout: prost-encoded [`StoreSnapshot`] followed by the 32-byte
//! SHA-256 of those bytes. Writes go to a sibling temp file that is renamed
//! over the target, so a crash never leaves a half-written snapshot.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use prost::Message;
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use stagecentral_wire::StoreSnapshot;

use crate::{StoreError, StoreResult};

const DIGEST_LEN: usize = 32;

/// `store.snapshot` -> `store.snapshot.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a snapshot to `path`, replacing any existing file.
pub fn write_snapshot(snapshot: &StoreSnapshot, path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let encoded = snapshot.encode_to_vec();
    let digest = Sha256::digest(&encoded);

    let tmp_path = temp_path(path);
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(&encoded)?;
    file.write_all(&digest)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read and verify a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> StoreResult<StoreSnapshot> {
    let data = fs::read(path)?;
    if data.len() < DIGEST_LEN {
        return Err(StoreError::InvalidDocument(format!(
            "snapshot {} is truncated",
            path.display()
        )));
    }

    let (encoded, recorded) = data.split_at(data.len() - DIGEST_LEN);
    let recorded = Output::<Sha256>::from_slice(recorded);
    let actual = Sha256::digest(encoded);
    if actual != *recorded {
        return Err(StoreError::ChecksumMismatch {
            expected: format!("{recorded:x}"),
            actual: format!("{actual:x}"),
        });
    }

    Ok(StoreSnapshot::decode(encoded)?)
}
