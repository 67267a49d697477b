//! StageCentral Identity Core
//!
//! Pure domain types for account identity: player identities (PIDs), console
//! families, station URLs and the persisted account/config records.
//!
//! # Constraints
//!
//! This crate MUST NOT:
//! - Perform I/O (store access, network, files)
//! - Generate randomness (GUIDs are produced by the server crate)
//! - Hold process-wide state
//!
//! Everything here is a pure function of its inputs so the server crate can
//! compose it under whatever locking discipline it needs.

#![deny(unsafe_code)]

use std::fmt;
use std::net::IpAddr;

// ============================================================================
// Type Aliases
// ============================================================================

/// Server-assigned player identity.
///
/// Unique across all accounts, immutable once assigned. Zero is never handed
/// out by the allocator and doubles as "no identity yet" on a fresh session.
pub type Pid = u32;

/// Per-connection identifier used to disambiguate reconnections of one PID.
pub type ConnectionId = u32;

// ============================================================================
// Console Type
// ============================================================================

/// Originating platform family of an account.
///
/// Discriminants are the persisted `console_type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleType {
    Xbox = 0,
    PlayStation = 1,
    Wii = 2,
}

impl ConsoleType {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xbox => "xbox",
            Self::PlayStation => "playstation",
            Self::Wii => "wii",
        }
    }
}

impl TryFrom<i32> for ConsoleType {
    type Error = &'static str;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Xbox),
            1 => Ok(Self::PlayStation),
            2 => Ok(Self::Wii),
            _ => Err("console_type must be 0, 1 or 2"),
        }
    }
}

impl fmt::Display for ConsoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring the Wii client embeds in the email field of its create-account call.
pub const DUMMY_NINTENDO_MARKER: &str = "DummyNintendo";

/// Infer the console family from the email-like hint sent at handshake.
///
/// The create-account entry point is shared by Xbox account switching and Wii
/// log-in, so the only rule is: marker present means Wii, anything else
/// means Xbox. PlayStation accounts arrive through a different entry point
/// and are never produced here.
pub fn classify_console(hint: &str) -> ConsoleType {
    if hint.contains(DUMMY_NINTENDO_MARKER) {
        ConsoleType::Wii
    } else {
        ConsoleType::Xbox
    }
}

// ============================================================================
// Station URL
// ============================================================================

/// Transport scheme tag prefixed to every station URL.
pub const STATION_URL_SCHEME: &str = "prudp:/";

/// Service identifier clients expect in the `sid` field.
pub const DEFAULT_STATION_SID: u32 = 15;

/// Station type tag clients expect in the `type` field.
pub const DEFAULT_STATION_TYPE: u32 = 3;

/// Fixed parts of a station URL.
///
/// The field order `address;port;PID;sid;type;RVCID` is what deployed
/// clients parse and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationUrlTemplate {
    pub sid: u32,
    pub station_type: u32,
}

impl Default for StationUrlTemplate {
    fn default() -> Self {
        Self {
            sid: DEFAULT_STATION_SID,
            station_type: DEFAULT_STATION_TYPE,
        }
    }
}

impl StationUrlTemplate {
    /// Build the reconnection address for a client endpoint.
    pub fn synthesize(
        &self,
        ip: IpAddr,
        port: u16,
        pid: Pid,
        connection_id: ConnectionId,
    ) -> String {
        format!(
            "{STATION_URL_SCHEME}address={ip};port={port};PID={pid};sid={};type={};RVCID={connection_id}",
            self.sid, self.station_type
        )
    }
}

/// Build a station URL with the default `sid`/`type` tags.
pub fn synthesize_station_url(
    ip: IpAddr,
    port: u16,
    pid: Pid,
    connection_id: ConnectionId,
) -> String {
    StationUrlTemplate::default().synthesize(ip, port, pid, connection_id)
}

// ============================================================================
// Persisted Records
// ============================================================================

/// One account per distinct external username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub pid: Pid,
    pub console_type: ConsoleType,
    pub guid: String,
    pub created_by_machine_id: u32,
    pub station_url: String,
    pub int_station_url: String,
    pub sids: String,
    pub usids: String,
}

impl Account {
    /// Fresh account as inserted on first handshake; URLs and song lists empty.
    pub fn new(
        username: impl Into<String>,
        pid: Pid,
        console_type: ConsoleType,
        guid: impl Into<String>,
        created_by_machine_id: u32,
    ) -> Self {
        Self {
            username: username.into(),
            pid,
            console_type,
            guid: guid.into(),
            created_by_machine_id,
            station_url: String::new(),
            int_station_url: String::new(),
            sids: String::new(),
            usids: String::new(),
        }
    }
}

/// "Last allocated" counters held by the singleton config record.
///
/// Only `last_pid` is owned by this core; the rest are carried through for
/// other subsystems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastIds {
    pub last_pid: Pid,
    pub last_machine_id: u32,
    pub last_band_id: u32,
    pub last_setlist_id: u32,
    pub last_character_id: u32,
}

impl LastIds {
    /// Next PID after `last_pid`, or `None` if the counter is exhausted.
    pub fn next_pid(&self) -> Option<Pid> {
        self.last_pid.checked_add(1)
    }

    /// Copy with `last_pid` replaced, other counters carried through.
    pub fn with_last_pid(self, last_pid: Pid) -> Self {
        Self { last_pid, ..self }
    }
}

// ============================================================================
// Tests
// ============================================================================
