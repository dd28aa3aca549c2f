use std::time::Duration;

use skydimo_probe_lib::util::discovery::{DiscoveryConfig, DiscoveryListener, DEFAULT_PORT};
use tokio::net::UdpSocket;

const SESSION: Duration = Duration::from_millis(500);

async fn send_all(port: u16, datagrams: &[&[u8]]) {
    let sender = UdpSocket::bind("127.0.0.1:0").await.expect("sender socket");
    for datagram in datagrams {
        sender
            .send_to(datagram, ("127.0.0.1", port))
            .await
            .expect("send datagram");
    }
}

#[test]
fn default_config_matches_announcement_port() {
    let config = DiscoveryConfig::default();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.bind_address().to_string(), "0.0.0.0:9527");
    assert_eq!(DiscoveryConfig::new(8888).with_buffer_size(512).buffer_size, 512);
}

#[tokio::test]
async fn registers_new_and_updated_devices() {
    let listener = DiscoveryListener::bind(DiscoveryConfig::new(0)).expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let session = tokio::spawn(listener.run_until(tokio::time::sleep(SESSION)));

    send_all(
        port,
        &[
            br#"{"type":"device_report","name":"Desk","ip":"10.0.0.5","mac":"AA:BB:CC:00:00:01"}"#,
            br#"{"type":"device_report","name":"Desk (renamed)","mac":"AA:BB:CC:00:00:01"}"#,
            br#"{"type":"device_report","name":"Shelf"}"#,
        ],
    )
    .await;

    let registry = session.await.expect("listener task");
    assert_eq!(registry.len(), 2);
    let desk = registry.get("AA:BB:CC:00:00:01").expect("desk entry");
    assert_eq!(desk.report.name.as_deref(), Some("Desk (renamed)"));
    assert_eq!(desk.report.ip, None);
    let shelf = registry.get("127.0.0.1").expect("entry keyed by source ip");
    assert_eq!(shelf.report.name.as_deref(), Some("Shelf"));
}

#[tokio::test]
async fn malformed_and_foreign_datagrams_do_not_stop_the_loop() {
    let listener = DiscoveryListener::bind(DiscoveryConfig::new(0)).expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let session = tokio::spawn(listener.run_until(tokio::time::sleep(SESSION)));

    send_all(
        port,
        &[
            b"\xff\xfe\xfd",
            b"{\"type\": \"device_report\", ",
            b"[1, 2, 3]",
            br#"{"type":"heartbeat","mac":"11:22:33:44:55:66"}"#,
            br#"{"mac":"11:22:33:44:55:66"}"#,
            br#"{"type":"device_report","mac":"11:22:33:44:55:66","rssi":-48}"#,
        ],
    )
    .await;

    let registry = session.await.expect("listener task");
    assert_eq!(registry.len(), 1);
    let entry = registry.get("11:22:33:44:55:66").expect("valid report after junk");
    assert_eq!(entry.report.rssi, Some(-48));
}

#[tokio::test]
async fn socket_is_released_after_shutdown() {
    let listener = DiscoveryListener::bind(DiscoveryConfig::new(0)).expect("bind");
    let port = listener.local_addr().expect("local addr").port();

    let registry = listener.run_until(async {}).await;
    assert!(registry.is_empty());

    // A socket without SO_REUSEADDR can only bind once the listener is gone.
    std::net::UdpSocket::bind(("0.0.0.0", port)).expect("port released");
}

#[tokio::test]
async fn bind_fails_on_occupied_port() {
    let blocker = std::net::UdpSocket::bind("0.0.0.0:0").expect("blocker socket");
    let port = blocker.local_addr().expect("blocker addr").port();

    let err = DiscoveryListener::bind(DiscoveryConfig::new(port))
        .err()
        .expect("bind should fail");
    assert!(err.to_string().contains(&port.to_string()));
}
