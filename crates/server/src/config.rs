//! Server configuration.
//!
//! [`ServerConfig`] carries the effective values; [`FileConfig`] is the
//! optional TOML overlay, every key of which may be omitted.

use std::path::Path;

use serde::Deserialize;
use stagecentral_identity::{DEFAULT_STATION_SID, DEFAULT_STATION_TYPE, StationUrlTemplate};

/// Extra attempts for a store call that failed transiently.
pub const MAX_STORE_RETRIES: u32 = 3;

/// Attempts at the `last_pid` compare-and-set before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 16;

/// Which PIDs of a song-list sync must belong to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongSyncPolicy {
    /// Only the first listed PID is checked. Deployed clients rely on this.
    #[default]
    First,
    /// Every listed PID must be the caller's.
    All,
}

/// Effective server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub station_sid: u32,
    pub station_type: u32,
    pub song_sync_policy: SongSyncPolicy,
    pub max_store_retries: u32,
    pub max_allocation_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            station_sid: DEFAULT_STATION_SID,
            station_type: DEFAULT_STATION_TYPE,
            song_sync_policy: SongSyncPolicy::default(),
            max_store_retries: MAX_STORE_RETRIES,
            max_allocation_attempts: MAX_ALLOCATION_ATTEMPTS,
        }
    }
}

impl ServerConfig {
    /// Apply a file overlay on top of the defaults.
    pub fn resolve(file: Option<FileConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            station_sid: file.station_sid.unwrap_or(defaults.station_sid),
            station_type: file.station_type.unwrap_or(defaults.station_type),
            song_sync_policy: file.song_sync_policy.unwrap_or(defaults.song_sync_policy),
            max_store_retries: file.max_store_retries.unwrap_or(defaults.max_store_retries),
            max_allocation_attempts: file
                .max_allocation_attempts
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_allocation_attempts),
        }
    }

    pub fn station_url_template(&self) -> StationUrlTemplate {
        StationUrlTemplate {
            sid: self.station_sid,
            station_type: self.station_type,
        }
    }
}

/// TOML overlay. Unknown keys are ignored.
#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    pub station_sid: Option<u32>,
    pub station_type: Option<u32>,
    pub song_sync_policy: Option<SongSyncPolicy>,
    pub max_store_retries: Option<u32>,
    pub max_allocation_attempts: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}
