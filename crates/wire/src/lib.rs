//! StageCentral Wire Types
//!
//! Shared message types used at the edges of the identity core:
//!
//! - **Documents** (prost): the `users`/`config` records as stored, and the
//!   snapshot container used by the file-backed store.
//! - **RMC framing**: success responses for the account-management protocol
//!   and the data packet that carries them, with reliability flags.
//! - **JSON envelopes**: request/response bodies of path-keyed JSON services.
//!
//! The transport's byte-level packet encoding, retransmission and encryption
//! are not implemented here; [`Packet`] is the fully-framed hand-off value.

#![deny(unsafe_code)]

use prost::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stagecentral_identity::{Account, ConsoleType, LastIds, Pid};

// ============================================================================
// Protocol Constants
// ============================================================================

/// RMC protocol id of account management.
pub const ACCOUNT_MANAGEMENT_PROTOCOL_ID: u8 = 0x19;

/// Method id of `NintendoCreateAccount` (also used for Xbox account switching).
pub const NINTENDO_CREATE_ACCOUNT_METHOD_ID: u32 = 0x1B;

/// Quazal core error code reported when a call fails server-side.
pub const OPERATION_ERROR: u32 = 0x8001_0001;

/// Source routing tag of account-management responses.
pub const ACCOUNT_MANAGEMENT_SOURCE: u8 = 0x31;

/// Destination routing tag of account-management responses.
pub const ACCOUNT_MANAGEMENT_DESTINATION: u8 = 0x3F;

/// Bit set on the method id of a response.
const RMC_RESPONSE_METHOD_BIT: u32 = 0x8000;

// ============================================================================
// Stored Documents
// ============================================================================

/// One `users` document.
#[derive(Clone, PartialEq, Message)]
pub struct AccountDocument {
    #[prost(string, tag = "1")]
    pub username: String,

    #[prost(uint32, tag = "2")]
    pub pid: u32,

    /// 0 = Xbox, 1 = PlayStation, 2 = Wii.
    #[prost(int32, tag = "3")]
    pub console_type: i32,

    #[prost(string, tag = "4")]
    pub guid: String,

    #[prost(uint32, tag = "5")]
    pub created_by_machine_id: u32,

    #[prost(string, tag = "6")]
    pub station_url: String,

    #[prost(string, tag = "7")]
    pub int_station_url: String,

    #[prost(string, tag = "8")]
    pub sids: String,

    #[prost(string, tag = "9")]
    pub usids: String,
}

/// The singleton `config` document.
#[derive(Clone, PartialEq, Message)]
pub struct ConfigDocument {
    #[prost(uint32, tag = "1")]
    pub last_pid: u32,

    #[prost(uint32, tag = "2")]
    pub last_machine_id: u32,

    #[prost(uint32, tag = "3")]
    pub last_band_id: u32,

    #[prost(uint32, tag = "4")]
    pub last_setlist_id: u32,

    #[prost(uint32, tag = "5")]
    pub last_character_id: u32,
}

/// Snapshot of every collection, as written to disk.
#[derive(Clone, PartialEq, Message)]
pub struct StoreSnapshot {
    /// Schema version (starts at 1).
    #[prost(uint32, tag = "1")]
    pub snapshot_format_version: u32,

    #[prost(message, optional, tag = "2")]
    pub config: Option<ConfigDocument>,

    /// Accounts ordered by pid ascending.
    #[prost(message, repeated, tag = "3")]
    pub users: Vec<AccountDocument>,
}

/// Current [`StoreSnapshot::snapshot_format_version`].
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Conversion Traits
// ============================================================================

impl From<Account> for AccountDocument {
    fn from(a: Account) -> Self {
        Self {
            username: a.username,
            pid: a.pid,
            console_type: a.console_type.as_i32(),
            guid: a.guid,
            created_by_machine_id: a.created_by_machine_id,
            station_url: a.station_url,
            int_station_url: a.int_station_url,
            sids: a.sids,
            usids: a.usids,
        }
    }
}

impl TryFrom<AccountDocument> for Account {
    type Error = &'static str;

    fn try_from(d: AccountDocument) -> Result<Self, Self::Error> {
        if d.username.is_empty() {
            return Err("username must not be empty");
        }
        Ok(Self {
            username: d.username,
            pid: d.pid,
            console_type: ConsoleType::try_from(d.console_type)?,
            guid: d.guid,
            created_by_machine_id: d.created_by_machine_id,
            station_url: d.station_url,
            int_station_url: d.int_station_url,
            sids: d.sids,
            usids: d.usids,
        })
    }
}

impl From<LastIds> for ConfigDocument {
    fn from(ids: LastIds) -> Self {
        Self {
            last_pid: ids.last_pid,
            last_machine_id: ids.last_machine_id,
            last_band_id: ids.last_band_id,
            last_setlist_id: ids.last_setlist_id,
            last_character_id: ids.last_character_id,
        }
    }
}

impl From<ConfigDocument> for LastIds {
    fn from(d: ConfigDocument) -> Self {
        Self {
            last_pid: d.last_pid,
            last_machine_id: d.last_machine_id,
            last_band_id: d.last_band_id,
            last_setlist_id: d.last_setlist_id,
            last_character_id: d.last_character_id,
        }
    }
}

// ============================================================================
// RMC Framing
// ============================================================================

/// Successful RMC response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RmcResponse {
    pub protocol_id: u8,
    pub call_id: u32,
    pub method_id: u32,
    pub body: Vec<u8>,
}

impl RmcResponse {
    pub fn success(protocol_id: u8, method_id: u32, call_id: u32, body: Vec<u8>) -> Self {
        Self {
            protocol_id,
            call_id,
            method_id,
            body,
        }
    }

    /// `NintendoCreateAccount` response carrying the resolved PID.
    pub fn create_account(call_id: u32, pid: Pid) -> Self {
        Self::success(
            ACCOUNT_MANAGEMENT_PROTOCOL_ID,
            NINTENDO_CREATE_ACCOUNT_METHOD_ID,
            call_id,
            pid.to_le_bytes().to_vec(),
        )
    }

    /// Layout: `size:u32 | protocol:u8 | success:u8 | call_id:u32 | method_id|0x8000:u32 | body`,
    /// all little-endian; `size` counts the bytes after itself.
    pub fn to_bytes(&self) -> Vec<u8> {
        let size = 1 + 1 + 4 + 4 + self.body.len();
        let mut out = Vec::with_capacity(4 + size);
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.push(self.protocol_id);
        out.push(1);
        out.extend_from_slice(&self.call_id.to_le_bytes());
        out.extend_from_slice(&(self.method_id | RMC_RESPONSE_METHOD_BIT).to_le_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

/// PRUDP v0 packet types sent by the identity core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Data = 2,
}

/// PRUDP v0 packet flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags(u16);

impl PacketFlags {
    pub const RELIABLE: Self = Self(0x002);
    pub const NEEDS_ACK: Self = Self(0x004);

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Fully framed packet handed to the transport for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub source: u8,
    pub destination: u8,
    pub packet_type: PacketType,
    pub flags: PacketFlags,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Reliable data packet for an account-management response.
    pub fn account_management_response(rmc: &RmcResponse) -> Self {
        Self {
            version: 0,
            source: ACCOUNT_MANAGEMENT_SOURCE,
            destination: ACCOUNT_MANAGEMENT_DESTINATION,
            packet_type: PacketType::Data,
            flags: PacketFlags::NEEDS_ACK | PacketFlags::RELIABLE,
            payload: rmc.to_bytes(),
        }
    }
}

// ============================================================================
// JSON Services
// ============================================================================

/// Routing header present on every JSON request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRequestHead {
    pub path: String,
}

/// Response envelope: the service path plus its result rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonResponse<T> {
    pub path: String,
    pub data: Vec<T>,
}

/// Serialize a JSON service response.
pub fn marshal_response<T: Serialize>(path: &str, data: Vec<T>) -> serde_json::Result<String> {
    serde_json::to_string(&JsonResponse {
        path: path.to_string(),
        data,
    })
}

/// Deserialize a JSON service request. Unknown fields are ignored.
pub fn unmarshal_request<T: DeserializeOwned>(data: &str) -> serde_json::Result<T> {
    serde_json::from_str(data)
}

/// `misc/sync_available_songs` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncAvailableSongsRequest {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub system_ms: i64,
    #[serde(default)]
    pub machine_id: String,
    #[serde(default)]
    pub session_guid: String,
    #[serde(rename = "pidXXX", default)]
    pub pids: Vec<Pid>,
    #[serde(default)]
    pub sids: String,
    #[serde(default)]
    pub usids: String,
}

/// `misc/sync_available_songs` result row; `ret_code` 1 = success, 0 = failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncAvailableSongsResponse {
    pub ret_code: i32,
}

// ============================================================================
// Tests
// ============================================================================
