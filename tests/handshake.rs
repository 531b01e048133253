//! Integration tests for the bind / connect lifecycle.
//!
//! Each test runs a [`SimulatedPeer`] on loopback and verifies the
//! connection's state transitions and error reporting around the mocked
//! handshake.

use std::net::SocketAddr;
use std::time::Duration;

use window_flow::config::ConnectionConfig;
use window_flow::connection::{BindError, ConnectError, Connection};
use window_flow::peer::{AckPolicy, SimulatedPeer};
use window_flow::state::ConnState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Short handshake timeouts so the failure tests stay fast.
fn quick_config() -> ConnectionConfig {
    ConnectionConfig {
        handshake_rto: Duration::from_millis(50),
        handshake_max_retries: 2,
        ..ConnectionConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// A clean handshake must leave the connection `Connected` with the window
/// the peer advertised.
#[tokio::test]
async fn handshake_adopts_advertised_window() {
    const WINDOW: u32 = 2048;

    let mut peer = SimulatedPeer::bind(loopback(), WINDOW, AckPolicy::NeverAck)
        .await
        .expect("peer bind");
    peer.listen();

    let mut conn = Connection::new(quick_config());
    assert_eq!(conn.state, ConnState::Unbound);

    conn.bind(loopback()).await.expect("bind");
    assert_eq!(conn.state, ConnState::Bound);
    assert!(conn.local_addr().is_some());

    conn.connect(peer.local_addr).await.expect("connect");
    assert_eq!(conn.state, ConnState::Connected);
    assert_eq!(conn.peer_window(), Some(WINDOW));

    conn.disconnect().await;
    peer.disconnect();
}

/// Connecting to an address where nobody is listening must fail after the
/// retries are exhausted rather than hang forever.
#[tokio::test]
async fn connect_to_silent_address_fails() {
    // Bind a socket we immediately drop so the port is unbound; any SYN sent
    // there will receive no reply.
    let silent_addr = {
        let peer = SimulatedPeer::bind(loopback(), 64, AckPolicy::NeverAck)
            .await
            .expect("tmp bind");
        peer.local_addr // peer is dropped here (socket closes)
    };

    let mut conn = Connection::new(quick_config());
    conn.bind(loopback()).await.expect("bind");

    let result = conn.connect(silent_addr).await;
    assert!(
        matches!(result, Err(ConnectError::PeerNotListening)),
        "expected PeerNotListening, got: {result:?}"
    );
    // A failed handshake leaves the connection bound and retriable.
    assert_eq!(conn.state, ConnState::Bound);
}

/// A peer that has bound but not called `listen` answers nothing either.
#[tokio::test]
async fn connect_to_bound_but_not_listening_peer_fails() {
    let peer = SimulatedPeer::bind(loopback(), 64, AckPolicy::AlwaysAck)
        .await
        .expect("peer bind");
    // No peer.listen() on purpose.

    let mut conn = Connection::new(quick_config());
    conn.bind(loopback()).await.expect("bind");

    assert!(matches!(
        conn.connect(peer.local_addr).await,
        Err(ConnectError::PeerNotListening)
    ));
}

/// Traffic from other sources while the SYN is outstanding must not consume
/// handshake retries: each attempt keeps its full RTO budget.
#[tokio::test]
async fn stray_traffic_does_not_exhaust_handshake_retries() {
    use window_flow::segment::{flags, Segment};

    let mut peer = SimulatedPeer::bind(loopback(), 64, AckPolicy::AlwaysAck)
        .await
        .expect("peer bind");
    peer.listen();

    let mut conn = Connection::new(quick_config());
    conn.bind(loopback()).await.expect("bind");
    let target = conn.local_addr().expect("bound");

    // A stranger hammers the connecting socket with well-formed segments
    // (and some raw noise) for the whole handshake window.
    let flooder = tokio::spawn(async move {
        let noise = tokio::net::UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("noise bind");
        let stray = Segment::control(9, 9, flags::ACK, 0).encode();
        for _ in 0..40 {
            let _ = noise.send_to(&stray, target).await;
            let _ = noise.send_to(b"line noise", target).await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    });

    conn.connect(peer.local_addr)
        .await
        .expect("stray datagrams must not burn handshake retries");

    flooder.abort();
    conn.disconnect().await;
    peer.disconnect();
}

#[tokio::test]
async fn double_bind_is_rejected() {
    let mut conn = Connection::new(quick_config());
    conn.bind(loopback()).await.expect("first bind");

    assert!(matches!(
        conn.bind(loopback()).await,
        Err(BindError::AlreadyBound)
    ));
}

#[tokio::test]
async fn connect_before_bind_is_rejected() {
    let mut conn = Connection::new(quick_config());
    let somewhere = loopback();

    assert!(matches!(
        conn.connect(somewhere).await,
        Err(ConnectError::NotBound)
    ));
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let mut peer = SimulatedPeer::bind(loopback(), 64, AckPolicy::AlwaysAck)
        .await
        .expect("peer bind");
    peer.listen();

    let mut conn = Connection::new(quick_config());
    conn.bind(loopback()).await.expect("bind");
    conn.connect(peer.local_addr).await.expect("connect");

    assert!(matches!(
        conn.connect(peer.local_addr).await,
        Err(ConnectError::AlreadyConnected)
    ));
}
