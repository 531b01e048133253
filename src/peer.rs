//! Programmable stand-in for a remote endpoint.
//!
//! [`SimulatedPeer`] plays the passive side of a connection so the send path
//! can be exercised deterministically: it answers the handshake (advertising
//! its configured receive window), appends every in-order data payload to an
//! internal log, and acknowledges — or deliberately withholds
//! acknowledgments — according to its [`AckPolicy`].
//!
//! The `NeverAck` policy is the interesting one: a sender facing a silent
//! peer must transmit exactly one window's worth of bytes and then stall,
//! which [`SimulatedPeer::assert_sent_full_window`] verifies after the
//! sender's timeout.
//!
//! The service loop runs as a background tokio task spawned by
//! [`listen`](SimulatedPeer::listen); the received log sits behind a mutex
//! because the task appends while the test thread inspects.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::connection::BindError;
use crate::segment::{flags, Segment};
use crate::socket::Socket;

// ---------------------------------------------------------------------------
// AckPolicy
// ---------------------------------------------------------------------------

/// How the peer responds to incoming data segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Acknowledge every data segment immediately.
    AlwaysAck,
    /// Never acknowledge: forces the sender to exhaust its window and stall.
    NeverAck,
    /// Acknowledge after the given delay.
    ///
    /// A delay shorter than the sender's ack deadline lets a stalled sender
    /// resume; a longer one behaves like [`NeverAck`] from the sender's
    /// point of view.
    DelayedAck(Duration),
}

// ---------------------------------------------------------------------------
// AssertionFailure
// ---------------------------------------------------------------------------

/// Raised only by the verification methods; never by the service loop.
#[derive(Debug, PartialEq, Eq)]
pub enum AssertionFailure {
    /// The received log does not have the expected length.
    WrongLength { expected: usize, actual: usize },
    /// The received log diverges from the expected bytes at `offset`.
    ContentMismatch { offset: usize },
}

impl std::fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongLength { expected, actual } => {
                write!(f, "expected {expected} received bytes, found {actual}")
            }
            Self::ContentMismatch { offset } => {
                write!(f, "received bytes diverge from the payload at offset {offset}")
            }
        }
    }
}

impl std::error::Error for AssertionFailure {}

// ---------------------------------------------------------------------------
// SimulatedPeer
// ---------------------------------------------------------------------------

/// A scriptable remote endpoint for tests and demos.
pub struct SimulatedPeer {
    /// Address the peer is bound to (resolved ephemeral port included).
    pub local_addr: SocketAddr,
    recv_window: u32,
    policy: AckPolicy,
    received: Arc<Mutex<Vec<u8>>>,
    socket: Option<Arc<Socket>>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedPeer {
    /// Reserve a local address for the peer.
    ///
    /// `recv_window` is the receive window (bytes, ≥ 1) the peer will
    /// advertise during the handshake; the connecting sender adopts it.
    pub async fn bind(
        local: SocketAddr,
        recv_window: u32,
        policy: AckPolicy,
    ) -> Result<Self, BindError> {
        assert!(recv_window >= 1, "recv_window must be at least 1 byte");
        let socket = Socket::bind(local).await.map_err(BindError::Unavailable)?;
        let local_addr = socket.local_addr;
        log::debug!("[peer] bound to {local_addr}, window={recv_window}, policy={policy:?}");
        Ok(Self {
            local_addr,
            recv_window,
            policy,
            received: Arc::new(Mutex::new(Vec::new())),
            socket: Some(Arc::new(socket)),
            task: None,
        })
    }

    /// Start serving: answer handshakes, log data, acknowledge per policy.
    ///
    /// Spawns the service loop as a background task; calling `listen` again
    /// while it is running has no effect.
    pub fn listen(&mut self) {
        if self.task.is_some() {
            return;
        }
        let Some(socket) = self.socket.clone() else {
            return; // already disconnected
        };
        let log = Arc::clone(&self.received);
        let window = self.recv_window;
        let policy = self.policy;
        self.task = Some(tokio::spawn(service_loop(socket, window, policy, log)));
    }

    /// The receive window this peer advertises.
    pub fn recv_window(&self) -> u32 {
        self.recv_window
    }

    /// Snapshot of every payload byte received so far, in arrival order.
    pub fn received(&self) -> Vec<u8> {
        self.received.lock().expect("received-log mutex poisoned").clone()
    }

    /// Verify that the sender stalled exactly at the window boundary.
    ///
    /// Succeeds iff the received log is exactly `recv_window` bytes long and
    /// equals the first `recv_window` bytes of `expected` — i.e. the sender
    /// neither over- nor under-sent before its timeout.
    pub fn assert_sent_full_window(&self, expected: &[u8]) -> Result<(), AssertionFailure> {
        let window = self.recv_window as usize;
        self.assert_log_matches(&expected[..expected.len().min(window)], window)
    }

    /// Verify that the full `expected` payload arrived, byte for byte.
    pub fn assert_received(&self, expected: &[u8]) -> Result<(), AssertionFailure> {
        self.assert_log_matches(expected, expected.len())
    }

    fn assert_log_matches(
        &self,
        expected: &[u8],
        expected_len: usize,
    ) -> Result<(), AssertionFailure> {
        let log = self.received();
        if log.len() != expected_len {
            return Err(AssertionFailure::WrongLength {
                expected: expected_len,
                actual: log.len(),
            });
        }
        if let Some(offset) = log.iter().zip(expected).position(|(a, b)| a != b) {
            return Err(AssertionFailure::ContentMismatch { offset });
        }
        // A log longer than `expected` with equal prefix means over-send.
        if log.len() > expected.len() {
            return Err(AssertionFailure::ContentMismatch {
                offset: expected.len(),
            });
        }
        Ok(())
    }

    /// Stop serving and release the port.  Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            log::debug!("[peer] service loop stopped");
        }
        self.socket = None;
    }
}

impl Drop for SimulatedPeer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Service loop
// ---------------------------------------------------------------------------

async fn service_loop(
    socket: Arc<Socket>,
    recv_window: u32,
    policy: AckPolicy,
    log: Arc<Mutex<Vec<u8>>>,
) {
    // Sequence number for our own control segments.
    let seq_out: u32 = rand::random();
    // Set once the handshake pins down the client and its ISN.
    let mut client: Option<SocketAddr> = None;
    let mut rcv_nxt: u32 = 0;

    loop {
        let (seg, addr) = match socket.recv_from().await {
            Ok(v) => v,
            Err(e) => {
                log::debug!("[peer] socket error, stopping: {e}");
                break;
            }
        };
        let h = seg.header.clone();

        if h.flags & flags::SYN != 0 {
            // Handshake: advertise our receive window in the SYN-ACK.
            client = Some(addr);
            rcv_nxt = h.seq.wrapping_add(1);
            let synack = Segment::control(
                seq_out,
                rcv_nxt,
                flags::SYN | flags::ACK,
                recv_window,
            );
            let _ = socket.send_to(&synack, addr).await;
            log::debug!("[peer] ← SYN from {addr}; → SYN-ACK window={recv_window}");
            continue;
        }

        if client != Some(addr) {
            continue; // stranger
        }

        if h.flags & flags::FIN != 0 {
            // FINs are acknowledged even under NeverAck so teardown is clean.
            let fin_ack =
                Segment::control(seq_out, h.seq.wrapping_add(1), flags::ACK, recv_window);
            let _ = socket.send_to(&fin_ack, addr).await;
            log::debug!("[peer] ← FIN; → ACK");
            continue;
        }

        if seg.payload.is_empty() {
            continue; // the client's final handshake ACK, or a stray control
        }

        if h.seq == rcv_nxt {
            log.lock()
                .expect("received-log mutex poisoned")
                .extend_from_slice(&seg.payload);
            rcv_nxt = rcv_nxt.wrapping_add(seg.payload.len() as u32);
            log::debug!("[peer] ← DATA seq={} len={}", h.seq, seg.payload.len());
        } else {
            // Duplicate or out-of-order: drop, keeping the log a payload prefix.
            log::debug!(
                "[peer] ← DATA seq={} (expected {rcv_nxt}) — discarded",
                h.seq
            );
        }

        match policy {
            AckPolicy::NeverAck => {}
            AckPolicy::AlwaysAck => {
                let ack = Segment::control(seq_out, rcv_nxt, flags::ACK, recv_window);
                let _ = socket.send_to(&ack, addr).await;
            }
            AckPolicy::DelayedAck(delay) => {
                tokio::time::sleep(delay).await;
                let ack = Segment::control(seq_out, rcv_nxt, flags::ACK, recv_window);
                let _ = socket.send_to(&ack, addr).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (assertion logic; the service loop is covered by tests/)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn peer_with_log(window: u32, bytes: &[u8]) -> SimulatedPeer {
        let peer = SimulatedPeer::bind(
            "127.0.0.1:0".parse().unwrap(),
            window,
            AckPolicy::NeverAck,
        )
        .await
        .expect("bind");
        peer.received.lock().unwrap().extend_from_slice(bytes);
        peer
    }

    #[tokio::test]
    async fn full_window_assertion_passes_on_exact_prefix() {
        let payload = b"abcdefghij"; // 10 bytes, window 4
        let peer = peer_with_log(4, &payload[..4]).await;
        assert_eq!(peer.assert_sent_full_window(payload), Ok(()));
    }

    #[tokio::test]
    async fn full_window_assertion_fails_on_short_log() {
        let payload = b"abcdefghij";
        let peer = peer_with_log(4, &payload[..3]).await;
        assert_eq!(
            peer.assert_sent_full_window(payload),
            Err(AssertionFailure::WrongLength {
                expected: 4,
                actual: 3
            })
        );
    }

    #[tokio::test]
    async fn full_window_assertion_fails_on_oversend() {
        let payload = b"abcdefghij";
        let peer = peer_with_log(4, &payload[..6]).await;
        assert_eq!(
            peer.assert_sent_full_window(payload),
            Err(AssertionFailure::WrongLength {
                expected: 4,
                actual: 6
            })
        );
    }

    #[tokio::test]
    async fn full_window_assertion_fails_on_wrong_bytes() {
        let payload = b"abcdefghij";
        let peer = peer_with_log(4, b"abXd").await;
        assert_eq!(
            peer.assert_sent_full_window(payload),
            Err(AssertionFailure::ContentMismatch { offset: 2 })
        );
    }

    #[tokio::test]
    async fn received_assertion_checks_whole_payload() {
        let peer = peer_with_log(64, b"hello").await;
        assert_eq!(peer.assert_received(b"hello"), Ok(()));
        assert!(peer.assert_received(b"hello!").is_err());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut peer = peer_with_log(4, b"").await;
        peer.listen();
        peer.disconnect();
        peer.disconnect(); // second call must be a no-op
        assert!(peer.task.is_none());
    }
}
