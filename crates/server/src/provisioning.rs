//! Account provisioning (`NintendoCreateAccount`).
//!
//! Handles both Wii log-in and Xbox 360 account switching:
//! 1. Classify the console from the email hint
//! 2. Refresh the cached counters (failure tolerated)
//! 3. Find the account, creating it with a fresh PID if the name is new
//! 4. Re-read a freshly created account for its authoritative PID
//! 5. Allocate a connection id and synthesize the station URL
//! 6. Bind the session to the account
//! 7. Persist the station URL and answer with the PID
//!
//! Any store failure from step 3 on sends an operational error instead.

use std::sync::Arc;

use stagecentral_identity::{Account, ConsoleType, Pid, StationUrlTemplate, classify_console};
use stagecentral_store::{IdentityStore, StoreError, StoreResult, with_retries};
use stagecentral_wire::{ACCOUNT_MANAGEMENT_PROTOCOL_ID, OPERATION_ERROR, Packet, RmcResponse};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ProvisionError;
use crate::pid_allocator::PidAllocator;
use crate::session::{ClientSession, ConnectionIdCounter};
use crate::transport::Transport;

pub struct AccountProvisioning {
    store: Arc<dyn IdentityStore>,
    allocator: Arc<PidAllocator>,
    connection_ids: ConnectionIdCounter,
    station_urls: StationUrlTemplate,
    max_store_retries: u32,
}

impl AccountProvisioning {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        allocator: Arc<PidAllocator>,
        connection_ids: ConnectionIdCounter,
        station_urls: StationUrlTemplate,
        max_store_retries: u32,
    ) -> Self {
        Self {
            store,
            allocator,
            connection_ids,
            station_urls,
            max_store_retries,
        }
    }

    fn retry<T>(&self, what: &str, op: impl FnMut() -> StoreResult<T>) -> StoreResult<T> {
        with_retries(what, self.max_store_retries, op)
    }

    /// Resolve or create the account for `username`, bind `session` to it and
    /// send the framed response through `transport`.
    ///
    /// On error an operational-error response has already been sent.
    pub fn provision(
        &self,
        call_id: u32,
        username: &str,
        console_hint: &str,
        session: &mut ClientSession,
        transport: &dyn Transport,
    ) -> Result<Pid, ProvisionError> {
        match self.bind_account(username, console_hint, session) {
            Ok(pid) => {
                let rmc = RmcResponse::create_account(call_id, pid);
                transport.send(Packet::account_management_response(&rmc));
                Ok(pid)
            }
            Err(e) => {
                error!(username, call_id, error = %e, "Account provisioning failed");
                transport.send_error(ACCOUNT_MANAGEMENT_PROTOCOL_ID, call_id, OPERATION_ERROR);
                Err(e)
            }
        }
    }

    fn bind_account(
        &self,
        username: &str,
        console_hint: &str,
        session: &mut ClientSession,
    ) -> Result<Pid, ProvisionError> {
        let console_type = classify_console(console_hint);

        if let Err(e) = self.allocator.refresh() {
            warn!(error = %e, "Could not load config, continuing with cached counters");
        }

        let account = self.resolve_account(username, console_type, session.pid())?;

        info!(
            username,
            pid = account.pid,
            console = %account.console_type,
            wii_fc = session.wii_friend_code().unwrap_or("-"),
            "Create-account log in"
        );

        // Wii clients never call RegisterEx, so the station URL is set here.
        let connection_id = self.connection_ids.increment();
        let address = session.address();
        let station_url =
            self.station_urls
                .synthesize(address.ip(), address.port(), account.pid, connection_id);

        session.set_username(username);
        session.set_external_station_url(station_url.clone());
        session.set_connection_id(connection_id);
        session.set_pid(account.pid);

        let matched = self.retry("update_station_urls", || {
            self.store.update_station_urls(username, &station_url, "")
        })?;
        debug!(username, matched, rvcid = connection_id, "Updated station URL");

        Ok(account.pid)
    }

    fn resolve_account(
        &self,
        username: &str,
        console_type: ConsoleType,
        machine_id: u32,
    ) -> Result<Account, ProvisionError> {
        if let Some(account) = self.retry("find_account_by_username", || {
            self.store.find_account_by_username(username)
        })? {
            return Ok(account);
        }

        info!(username, "First connection, creating account");

        let guid = Uuid::new_v4().to_string();
        let pid = self.allocator.allocate()?;
        let account = Account::new(username, pid, console_type, guid, machine_id);

        match self.retry("insert_account", || self.store.insert_account(account.clone())) {
            Ok(()) => {}
            Err(StoreError::DuplicateUsername(_)) => {
                // A concurrent handshake for the same name inserted first.
                warn!(username, burned_pid = pid, "Account created concurrently, using existing");
            }
            Err(e) => return Err(e.into()),
        }

        self.retry("find_account_by_username", || {
            self.store.find_account_by_username(username)
        })?
        .ok_or_else(|| ProvisionError::AccountVanished {
            username: username.to_string(),
        })
    }
}
