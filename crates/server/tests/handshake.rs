//! End-to-end log-in and song sync through the public server API.

use std::net::SocketAddr;
use std::sync::Arc;

use stagecentral_identity::{ConsoleType, LastIds, Pid};
use stagecentral_server::Server;
use stagecentral_server::config::{ServerConfig, SongSyncPolicy};
use stagecentral_server::session::ClientSession;
use stagecentral_server::transport::{Outbound, RecordingTransport};
use stagecentral_store::{IdentityStore, MemoryStore};

const WII_EMAIL: &str = "0123456789abcdef@DummyNintendo.com";

fn server_with(last_pid: Pid, config: ServerConfig) -> (Server, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_config(LastIds {
        last_pid,
        ..Default::default()
    }));
    (Server::new(config, store.clone()), store)
}

fn session(id: u64, addr: &str) -> ClientSession {
    let addr: SocketAddr = addr.parse().unwrap();
    ClientSession::new(id, addr)
}

fn sync_request(pids: &[Pid], sids: &str, usids: &str) -> String {
    serde_json::json!({
        "path": "misc/sync_available_songs",
        "region": "us",
        "system_ms": 0,
        "machine_id": "abc",
        "session_guid": "def",
        "pidXXX": pids,
        "sids": sids,
        "usids": usids,
    })
    .to_string()
}

fn ret_code(response: &str) -> i64 {
    let value: serde_json::Value = serde_json::from_str(response).unwrap();
    value["data"][0]["ret_code"].as_i64().unwrap()
}

#[test]
fn test_wii_login_then_song_sync() {
    let (server, store) = server_with(1000, ServerConfig::default());
    let transport = RecordingTransport::new();
    let mut wii = session(1, "203.0.113.9:50000");

    let pid = server
        .create_account(1, "wii_player", WII_EMAIL, &mut wii, &transport)
        .unwrap();
    assert_eq!(pid, 1001);
    assert!(matches!(transport.take().as_slice(), [Outbound::Packet(_)]));
    assert_eq!(
        wii.external_station_url(),
        "prudp:/address=203.0.113.9;port=50000;PID=1001;sid=15;type=3;RVCID=1"
    );

    let response = server
        .handle_json(&sync_request(&[pid], "1,2,3", "4"), &wii)
        .unwrap();
    assert_eq!(ret_code(&response), 1);

    let account = store.find_account_by_pid(pid).unwrap().unwrap();
    assert_eq!(account.console_type, ConsoleType::Wii);
    assert_eq!(account.sids, "1,2,3");
    assert_eq!(account.usids, "4");
}

#[test]
fn test_sync_before_login_is_rejected() {
    let (server, store) = server_with(0, ServerConfig::default());
    let transport = RecordingTransport::new();
    let mut owner = session(1, "198.51.100.1:1000");
    let pid = server
        .create_account(1, "owner", "owner@example.com", &mut owner, &transport)
        .unwrap();

    let stranger = session(2, "198.51.100.2:1000");
    let response = server
        .handle_json(&sync_request(&[pid], "X", "Y"), &stranger)
        .unwrap();

    assert_eq!(ret_code(&response), 0);
    assert!(store.find_account_by_pid(pid).unwrap().unwrap().sids.is_empty());
}

#[test]
fn test_strict_policy_from_config() {
    let config = ServerConfig {
        song_sync_policy: SongSyncPolicy::All,
        ..Default::default()
    };
    let (server, store) = server_with(0, config);
    let transport = RecordingTransport::new();

    let mut a = session(1, "198.51.100.1:1000");
    let mut b = session(2, "198.51.100.2:1000");
    let pid_a = server
        .create_account(1, "a", "a@example.com", &mut a, &transport)
        .unwrap();
    let pid_b = server
        .create_account(2, "b", "b@example.com", &mut b, &transport)
        .unwrap();

    let response = server
        .handle_json(&sync_request(&[pid_a, pid_b], "X", "Y"), &a)
        .unwrap();
    assert_eq!(ret_code(&response), 0);
    assert!(store.find_account_by_pid(pid_b).unwrap().unwrap().sids.is_empty());
}

#[test]
fn test_concurrent_logins_get_distinct_pids() {
    let (server, store) = server_with(0, ServerConfig::default());
    let server = Arc::new(server);

    let mut pids: Vec<Pid> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..32u16)
            .map(|i| {
                let server = server.clone();
                s.spawn(move || {
                    let transport = RecordingTransport::new();
                    let mut client = session(u64::from(i), &format!("10.0.0.{}:{}", i + 1, 4000 + i));
                    server
                        .create_account(
                            u32::from(i),
                            &format!("player{i}"),
                            "x@example.com",
                            &mut client,
                            &transport,
                        )
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    pids.sort_unstable();
    assert_eq!(pids, (1..=32).collect::<Vec<Pid>>());
    assert_eq!(store.load_config().unwrap().last_pid, 32);
    assert_eq!(store.account_count().unwrap(), 32);
}

#[test]
fn test_concurrent_first_login_same_name_creates_one_account() {
    let (server, store) = server_with(0, ServerConfig::default());
    let server = Arc::new(server);

    let pids: Vec<Pid> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8u16)
            .map(|i| {
                let server = server.clone();
                s.spawn(move || {
                    let transport = RecordingTransport::new();
                    let mut client = session(u64::from(i), &format!("10.0.1.{}:3074", i + 1));
                    server
                        .create_account(1, "racer", "x@example.com", &mut client, &transport)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(store.account_count().unwrap(), 1);
    let stored = store.find_account_by_username("racer").unwrap().unwrap();
    assert!(pids.iter().all(|&pid| pid == stored.pid));
}

#[test]
fn test_snapshot_restart_continues_pid_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.snapshot");

    {
        let (server, store) = server_with(0, ServerConfig::default());
        let transport = RecordingTransport::new();
        let mut client = session(1, "10.0.0.1:1000");
        server
            .create_account(1, "before", "x@example.com", &mut client, &transport)
            .unwrap();
        store.save_snapshot(&path).unwrap();
    }

    let store = Arc::new(MemoryStore::load_snapshot(&path).unwrap());
    let server = Server::new(ServerConfig::default(), store.clone());
    assert_eq!(server.cached_last_ids().last_pid, 1);

    let transport = RecordingTransport::new();
    let mut returning = session(2, "10.0.0.2:1000");
    let mut fresh = session(3, "10.0.0.3:1000");
    assert_eq!(
        server
            .create_account(1, "before", "x@example.com", &mut returning, &transport)
            .unwrap(),
        1
    );
    assert_eq!(
        server
            .create_account(2, "after", "x@example.com", &mut fresh, &transport)
            .unwrap(),
        2
    );
}
