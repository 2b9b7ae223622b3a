//! End-to-end scenarios against the in-process peer in `support`.

mod support;

use catio_client::{Client, ClientConfig, ClientError, RouteInfo, SessionState};
use catio_core::ads::{AdsReturnCode, AdsState};
use catio_core::ams::AmsNetId;
use catio_core::protocol::NotificationSettings;
use serde_json::json;
use std::time::Duration;
use support::{PEER_NET_ID, SLAVE_ADDRESSES, TestPeer, seed_symbols};

fn config() -> ClientConfig {
    ClientConfig::new(AmsNetId::new(10, 0, 0, 2, 1, 1), "127.0.0.1")
        .with_local_port(8001)
        .with_request_timeout(Duration::from_secs(2))
}

fn route_info() -> RouteInfo {
    RouteInfo {
        route_name: "catio-e2e".into(),
        host_name: "test-host".into(),
        host_ip: "127.0.0.1".into(),
        user_name: "guest".into(),
        password: "guest".into(),
    }
}

/// Route negotiation, connect, and device info: the discovery happy path.
#[tokio::test]
async fn discovery_happy_path() {
    let peer = TestPeer::start().await;
    let client = Client::new(config());

    let peer_id = client
        .add_route_at(peer.udp_addr, route_info())
        .await
        .unwrap();
    assert_eq!(peer_id, PEER_NET_ID);
    assert_eq!(peer.routes(), vec!["catio-e2e".to_string()]);

    client.connect_at(peer.tcp_addr, peer_id).await.unwrap();
    assert_eq!(client.state(), SessionState::Connected);

    let info = client.read_device_info().await.unwrap();
    assert_eq!(info.name.as_str(), "I/O Server");
    assert_eq!(info.version(), "3-1");
    assert_eq!(info.build, 4024);

    client.close().await;
    assert!(peer.routes().is_empty());
}

async fn connected_client(peer: &TestPeer) -> Client {
    let client = Client::new(config());
    client.connect_at(peer.tcp_addr, PEER_NET_ID).await.unwrap();
    client
}

/// Introspection reconstructs the seeded device and slave tree, and is
/// idempotent while the server state is unchanged.
#[tokio::test]
async fn introspection_builds_topology_and_is_idempotent() {
    let peer = TestPeer::start().await;
    let client = connected_client(&peer).await;

    let server = client.introspect().await.unwrap();
    assert_eq!(client.state(), SessionState::Introspected);
    assert_eq!(server.name, "I/O Server");
    assert_eq!(server.version, "3-1");
    assert_eq!(server.build, 4024);
    assert_eq!(server.devices.len(), 1);

    let device = &server.devices[0];
    assert_eq!(device.id, 1);
    assert_eq!(device.name, "Device 1 (EtherCAT)");
    assert_eq!(device.net_id, PEER_NET_ID);
    assert_eq!(device.slaves.len(), SLAVE_ADDRESSES.len());
    assert_eq!(device.frame_counters.cyclic_sent, 1000);

    // the first slave is the coupler at the root; others are its children
    let coupler = device.slave_by_address(1001).unwrap();
    assert_eq!(coupler.name, "Term 1 (EK1100)");
    assert!(coupler.parent.is_none());
    assert_eq!(device.root_slaves().count(), 1);
    for address in &SLAVE_ADDRESSES[1..] {
        let slave = device.slave_by_address(*address).unwrap();
        assert_eq!(slave.parent_address, 1001);
        assert!(slave.parent.is_some());
        assert!(!slave.orphan);
    }

    let again = client.introspect().await.unwrap();
    assert_eq!(again, server);

    client.close().await;
}

/// Symbol enumeration: every entry parses, names are unique, the expected
/// channel symbol is present.
#[tokio::test]
async fn symbol_enumeration() {
    let peer = TestPeer::start().await;
    seed_symbols(&peer.state, 461);
    let client = connected_client(&peer).await;
    client.introspect().await.unwrap();

    let catalog = client.load_symbols(1).await.unwrap();
    assert_eq!(catalog.len(), 461);
    assert_eq!(catalog.dropped(), 0);
    assert!(catalog.get("Term 2 (EL1014).Channel 1.Input").is_some());

    let mut names: Vec<&str> = catalog.symbols().iter().map(|s| s.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), 461);

    client.close().await;
}

/// Read-after-write on a digital output returns the written byte, both on
/// the raw address surface and through the symbol path.
#[tokio::test]
async fn read_after_write_digital_output() {
    let peer = TestPeer::start().await;
    seed_symbols(&peer.state, 4);

    let (conn, _stream) = catio_client::Connection::connect_to(
        peer.tcp_addr,
        PEER_NET_ID,
        config().local,
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    conn.write(conn.io_server(), 0xF021, 0x10, vec![0x01])
        .await
        .unwrap();
    let data = conn.read(conn.io_server(), 0xF021, 0x10, 1).await.unwrap();
    assert_eq!(data, vec![0x01]);
    conn.close().await;

    let client = connected_client(&peer).await;
    client.introspect().await.unwrap();
    client.load_symbols(1).await.unwrap();
    let name = "Term 2 (EL1014).Channel 1.Input";
    client.write_symbol(1, name, vec![0x01]).await.unwrap();
    assert_eq!(client.read_symbol(1, name).await.unwrap(), vec![0x01]);
    client.close().await;
}

/// The peer reports its ADS state.
#[tokio::test]
async fn read_state_reports_run() {
    let peer = TestPeer::start().await;
    let (conn, _stream) = catio_client::Connection::connect_to(
        peer.tcp_addr,
        PEER_NET_ID,
        config().local,
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    let (state, device_state) = conn.read_state(conn.io_server()).await.unwrap();
    assert_eq!(state, AdsState::Run);
    assert_eq!(device_state, 0);
    conn.close().await;
}

/// Symbol access by handle: fetch, write, read back, release; a released
/// handle is refused.
#[tokio::test]
async fn symbol_access_by_handle() {
    let peer = TestPeer::start().await;
    seed_symbols(&peer.state, 2);
    let (conn, _stream) = catio_client::Connection::connect_to(
        peer.tcp_addr,
        PEER_NET_ID,
        config().local,
        Duration::from_secs(2),
    )
    .await
    .unwrap();
    let target = conn.io_server();

    let name = "Term 2 (EL1014).Channel 1.Input";
    let handle = conn.handle_by_name(target, name).await.unwrap();
    conn.write_by_handle(target, handle, vec![0x01]).await.unwrap();
    assert_eq!(
        conn.read_by_handle(target, handle, 1).await.unwrap(),
        vec![0x01]
    );
    conn.release_handle(target, handle).await.unwrap();

    let err = conn.read_by_handle(target, handle, 1).await.unwrap_err();
    assert!(matches!(err, ClientError::Device { .. }));

    let err = conn.handle_by_name(target, "No.Such.Symbol").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Device {
            code: AdsReturnCode::DeviceSymbolNotFound,
            ..
        }
    ));
    conn.close().await;
}

/// Notification lifecycle: cyclic samples flow, cancel stops them, and
/// shutdown leaves the server's notification table empty.
#[tokio::test]
async fn notification_lifecycle() {
    let peer = TestPeer::start().await;
    seed_symbols(&peer.state, 4);
    let client = connected_client(&peer).await;
    client.introspect().await.unwrap();
    client.load_symbols(1).await.unwrap();

    let name = "Term 2 (EL1014).Channel 1.Input";
    let sub = client
        .subscribe(1, name, NotificationSettings::server_cycle(1_000_000))
        .await
        .unwrap();
    assert_eq!(peer.active_notifications(), 1);
    assert!(
        client
            .symbols(1)
            .await
            .unwrap()
            .get(name)
            .unwrap()
            .notification
            .is_some()
    );

    // 100 ms cycle: at least 9 samples within a second
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut samples = 0u32;
    while samples < 9 && tokio::time::Instant::now() < deadline {
        sub.recv_timeout(Duration::from_millis(500)).await.unwrap();
        samples += 1;
    }
    assert!(samples >= 9);

    sub.cancel().await.unwrap();
    assert_eq!(peer.active_notifications(), 0);

    client.close().await;
    assert_eq!(peer.active_notifications(), 0);
}

/// After cancellation the server no longer knows the handle: a second
/// delete reports it invalid.
#[tokio::test]
async fn cancelled_handle_is_unknown_to_server() {
    let peer = TestPeer::start().await;
    seed_symbols(&peer.state, 2);
    let client = connected_client(&peer).await;
    client.introspect().await.unwrap();
    client.load_symbols(1).await.unwrap();

    let name = "Term 2 (EL1014).Channel 1.Input";
    let sub = client
        .subscribe(1, name, NotificationSettings::server_on_change(100_000))
        .await
        .unwrap();
    let handle = sub.handle();
    sub.cancel().await.unwrap();

    // a raw second delete reports the handle unknown
    let (conn, _stream) = catio_client::Connection::connect_to(
        peer.tcp_addr,
        PEER_NET_ID,
        config().with_local_port(8002).local,
        Duration::from_secs(2),
    )
    .await
    .unwrap();
    let err = conn
        .delete_notification(conn.io_server(), handle)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Device {
            code: AdsReturnCode::DeviceNotifyHandleInvalid,
            ..
        }
    ));

    conn.close().await;
    client.close().await;
}

/// Eight concurrent reads answered in reverse order each resolve to their
/// own payload.
#[tokio::test]
async fn invoke_id_interleaving() {
    let peer = TestPeer::start().await;
    for i in 0u32..8 {
        peer.set_register(0xF020, i, vec![0x10 + i as u8]);
    }
    peer.arm_reverse_batch(8);

    let (conn, _stream) = catio_client::Connection::connect_to(
        peer.tcp_addr,
        PEER_NET_ID,
        config().local,
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    let mut tasks = Vec::new();
    for i in 0u32..8 {
        let conn = conn.clone();
        tasks.push(tokio::spawn(async move {
            let data = conn.read(conn.io_server(), 0xF020, i, 1).await.unwrap();
            assert_eq!(data, vec![0x10 + i as u8]);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    conn.close().await;
}

/// Facade surface: queries and commands dispatch by name, unknown names
/// fail typed.
#[tokio::test]
async fn facade_query_and_command() {
    let peer = TestPeer::start().await;
    seed_symbols(&peer.state, 4);
    let client = connected_client(&peer).await;
    client.introspect().await.unwrap();

    let facade = catio_client::Facade::new(client);

    let info = facade.query("device_info", json!({})).await.unwrap();
    assert_eq!(info["name"], "I/O Server");
    assert_eq!(info["build"], 4024);

    let count = facade.query("device_count", json!({})).await.unwrap();
    assert_eq!(count, json!(1));

    let slaves = facade
        .query("slaves", json!({ "device_id": 1 }))
        .await
        .unwrap();
    assert_eq!(slaves.as_array().unwrap().len(), SLAVE_ADDRESSES.len());

    let name = "Term 2 (EL1014).Channel 1.Input";
    facade
        .command(
            "symbol_value",
            json!({ "device_id": 1, "name": name, "value": true }),
        )
        .await
        .unwrap();
    let value = facade
        .query("symbol_value", json!({ "device_id": 1, "name": name }))
        .await
        .unwrap();
    assert_eq!(value, json!(true));

    let err = facade.query("nonsense", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownOperation { .. }));

    facade.client().close().await;
}

/// Killing the peer mid-flight fails in-flight calls with ConnectionLost
/// and later calls with ConnectionClosed.
#[tokio::test]
async fn connection_loss_mid_flight() {
    let peer = TestPeer::start().await;
    for i in 0u32..4 {
        peer.set_register(0xF020, i, vec![i as u8]);
    }

    let (conn, _stream) = catio_client::Connection::connect_to(
        peer.tcp_addr,
        PEER_NET_ID,
        config().local,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    // three successful reads first
    for i in 0u32..3 {
        let data = conn.read(conn.io_server(), 0xF020, i, 1).await.unwrap();
        assert_eq!(data, vec![i as u8]);
    }

    // two reads held in flight by reverse-batch buffering, then kill the peer
    peer.arm_reverse_batch(3);
    let mut inflight = Vec::new();
    for i in 0u32..2 {
        let conn = conn.clone();
        inflight.push(tokio::spawn(async move {
            conn.read(conn.io_server(), 0xF020, i, 1).await
        }));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(peer);

    for task in inflight {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionLost { .. }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = conn.read(conn.io_server(), 0xF020, 0, 1).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::ConnectionClosed | ClientError::ConnectionLost { .. }
    ));
}
