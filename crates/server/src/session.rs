//! Live client session state.
//!
//! Sessions are created and destroyed by the transport; services only read
//! and update them for the duration of a call.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use stagecentral_identity::{ConnectionId, Pid};

/// Session identifier (transport-internal).
pub type SessionId = u64;

/// Process-wide connection identifier source, shared with the transport.
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ConnectionIdCounter {
    next: Arc<AtomicU32>,
}

impl ConnectionIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter whose next `increment()` returns `start + 1`.
    pub fn starting_at(start: ConnectionId) -> Self {
        Self {
            next: Arc::new(AtomicU32::new(start)),
        }
    }

    /// Advance the counter and return the new value.
    pub fn increment(&self) -> ConnectionId {
        self.next.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Last value handed out.
    pub fn current(&self) -> ConnectionId {
        self.next.load(Ordering::Relaxed)
    }
}

/// Client session state.
#[derive(Debug, Clone)]
pub struct ClientSession {
    id: SessionId,
    address: SocketAddr,
    /// Transport-assigned identity; zero until a handshake resolves an account.
    pid: Pid,
    username: String,
    external_station_url: String,
    internal_station_url: String,
    connection_id: ConnectionId,
    /// Only known for Wii clients.
    wii_friend_code: Option<String>,
}

impl ClientSession {
    /// Create a session for a client observed at `address`.
    pub fn new(id: SessionId, address: SocketAddr) -> Self {
        Self {
            id,
            address,
            pid: 0,
            username: String::new(),
            external_station_url: String::new(),
            internal_station_url: String::new(),
            connection_id: 0,
            wii_friend_code: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn set_pid(&mut self, pid: Pid) {
        self.pid = pid;
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    pub fn external_station_url(&self) -> &str {
        &self.external_station_url
    }

    pub fn set_external_station_url(&mut self, url: impl Into<String>) {
        self.external_station_url = url.into();
    }

    pub fn internal_station_url(&self) -> &str {
        &self.internal_station_url
    }

    pub fn set_internal_station_url(&mut self, url: impl Into<String>) {
        self.internal_station_url = url.into();
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn set_connection_id(&mut self, connection_id: ConnectionId) {
        self.connection_id = connection_id;
    }

    pub fn wii_friend_code(&self) -> Option<&str> {
        self.wii_friend_code.as_deref()
    }

    pub fn set_wii_friend_code(&mut self, code: impl Into<String>) {
        self.wii_friend_code = Some(code.into());
    }
}
