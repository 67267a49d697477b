//! StageCentral Server
//!
//! Account and session services reached by clients over the reliable
//! transport. The server owns:
//! - PID allocation against the shared `last_pid` counter
//! - Account provisioning and station URL assignment at log-in
//! - Path-keyed JSON services (available-songs sync)
//!
//! # Architecture
//!
//! The transport owns connections and live sessions and calls into
//! [`Server`] once per inbound call, possibly from many threads at once.
//! Everything persistent goes through an [`IdentityStore`]; everything
//! outbound goes through a [`Transport`].

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod pid_allocator;
pub mod provisioning;
pub mod session;
pub mod songlist;
pub mod transport;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use stagecentral_identity::{LastIds, Pid};
use stagecentral_store::IdentityStore;
use tracing::{info, warn};

use config::ServerConfig;
use dispatch::JsonDispatcher;
use error::{ProvisionError, ServiceError};
use pid_allocator::PidAllocator;
use provisioning::AccountProvisioning;
use session::{ClientSession, ConnectionIdCounter};
use songlist::SongListSync;
use transport::Transport;

/// Entry point for inbound account and JSON calls.
pub struct Server {
    allocator: Arc<PidAllocator>,
    connection_ids: ConnectionIdCounter,
    provisioning: AccountProvisioning,
    json: JsonDispatcher,
}

impl Server {
    /// Create a server over `store`, with a fresh connection id counter.
    pub fn new(config: ServerConfig, store: Arc<dyn IdentityStore>) -> Self {
        Self::with_connection_ids(config, store, ConnectionIdCounter::new())
    }

    /// Create a server sharing `connection_ids` with the transport.
    pub fn with_connection_ids(
        config: ServerConfig,
        store: Arc<dyn IdentityStore>,
        connection_ids: ConnectionIdCounter,
    ) -> Self {
        let allocator = Arc::new(PidAllocator::new(
            store.clone(),
            config.max_allocation_attempts,
            config.max_store_retries,
        ));
        match allocator.refresh() {
            Ok(ids) => info!(last_pid = ids.last_pid, "Loaded counters"),
            Err(e) => warn!(error = %e, "Could not load counters at startup"),
        }

        let provisioning = AccountProvisioning::new(
            store.clone(),
            allocator.clone(),
            connection_ids.clone(),
            config.station_url_template(),
            config.max_store_retries,
        );

        let mut json = JsonDispatcher::new();
        json.register(Box::new(SongListSync::new(
            store,
            config.song_sync_policy,
            config.max_store_retries,
        )));

        Self {
            allocator,
            connection_ids,
            provisioning,
            json,
        }
    }

    /// Counter shared with the transport.
    pub fn connection_ids(&self) -> ConnectionIdCounter {
        self.connection_ids.clone()
    }

    /// Process-local copy of the config counters.
    pub fn cached_last_ids(&self) -> LastIds {
        self.allocator.cached()
    }

    /// `AccountManagement::NintendoCreateAccount`.
    ///
    /// `email` is only used to tell Wii from Xbox clients. The response (or
    /// operational error) has been handed to `transport` when this returns.
    pub fn create_account(
        &self,
        call_id: u32,
        username: &str,
        email: &str,
        session: &mut ClientSession,
        transport: &dyn Transport,
    ) -> Result<Pid, ProvisionError> {
        self.provisioning
            .provision(call_id, username, email, session, transport)
    }

    /// Handle a JSON-channel request, returning the JSON response.
    pub fn handle_json(&self, data: &str, session: &ClientSession) -> Result<String, ServiceError> {
        self.json.dispatch(data, session)
    }

    /// Paths of the registered JSON services.
    pub fn json_paths(&self) -> Vec<&'static str> {
        self.json.paths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecentral_store::MemoryStore;

    #[test]
    fn test_startup_loads_counters() {
        let store = Arc::new(MemoryStore::with_config(LastIds {
            last_pid: 300,
            last_setlist_id: 9,
            ..Default::default()
        }));
        let server = Server::new(ServerConfig::default(), store);

        assert_eq!(server.cached_last_ids().last_pid, 300);
        assert_eq!(server.cached_last_ids().last_setlist_id, 9);
    }

    #[test]
    fn test_registers_song_sync() {
        let server = Server::new(ServerConfig::default(), Arc::new(MemoryStore::new()));
        assert_eq!(server.json_paths(), vec![songlist::SYNC_AVAILABLE_SONGS_PATH]);
    }

    #[test]
    fn test_connection_ids_shared_with_transport() {
        let transport_counter = ConnectionIdCounter::starting_at(40);
        let server = Server::with_connection_ids(
            ServerConfig::default(),
            Arc::new(MemoryStore::new()),
            transport_counter.clone(),
        );
        let recording = transport::RecordingTransport::new();
        let mut session = ClientSession::new(1, "10.1.1.1:5000".parse().unwrap());

        transport_counter.increment();
        server
            .create_account(1, "shared", "x@example.com", &mut session, &recording)
            .unwrap();
        assert_eq!(session.connection_id(), 42);
        assert_eq!(server.connection_ids().current(), 42);
    }
}
