//! Per-connection lifecycle and the blocking windowed send path.
//!
//! A [`Connection`] owns the complete state for one outbound session:
//! - the lifecycle FSM (see [`crate::state`]),
//! - the [`crate::sender::WindowedSender`] flow-control state,
//! - the underlying [`crate::socket::Socket`].
//!
//! # Send path
//!
//! `send` streams the payload in chunks capped by the MSS and by the window
//! the peer advertised in its SYN-ACK.  While the window is full it parks in
//! a `tokio::select!` racing the socket against the acknowledgment deadline:
//! an ACK that advances the window cancels the deadline and sending resumes;
//! deadline expiry resolves into [`SendError::Timeout`].  At that point
//! exactly `min(payload_len, window)` bytes are on the wire, which is the
//! invariant [`crate::peer::SimulatedPeer::assert_sent_full_window`] checks.
//!
//! A timeout is an expected outcome, not a defect: the connection stays
//! `Connected` and the caller may retry or disconnect.

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::segment::{flags, Segment};
use crate::sender::WindowedSender;
use crate::socket::Socket;
use crate::state::ConnState;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from [`Connection::bind`].
#[derive(Debug)]
pub enum BindError {
    /// The connection already holds a local address.
    AlreadyBound,
    /// The OS refused the address (in use, no permission, ...).
    Unavailable(std::io::Error),
}

impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyBound => write!(f, "connection is already bound"),
            Self::Unavailable(e) => write!(f, "address unavailable: {e}"),
        }
    }
}

impl std::error::Error for BindError {}

/// Errors from [`Connection::connect`].
#[derive(Debug)]
pub enum ConnectError {
    /// `connect` called before `bind`.
    NotBound,
    /// The connection is already established.
    AlreadyConnected,
    /// No SYN-ACK after all handshake retries — nobody is listening there.
    PeerNotListening,
    /// Transport failure during the handshake.
    Io(std::io::Error),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotBound => write!(f, "connection is not bound to a local address"),
            Self::AlreadyConnected => write!(f, "connection is already established"),
            Self::PeerNotListening => write!(f, "peer did not answer the handshake"),
            Self::Io(e) => write!(f, "handshake transport error: {e}"),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<std::io::Error> for ConnectError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors from [`Connection::send`].
#[derive(Debug)]
pub enum SendError {
    /// `send` called on a connection that is not established.
    NotConnected,
    /// The window filled and no acknowledgment arrived within the deadline.
    ///
    /// Exactly one window's worth of bytes was transmitted before the stall;
    /// the connection remains usable.
    Timeout,
    /// Transport failure while transmitting or waiting for ACKs.
    Io(std::io::Error),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "connection is not established"),
            Self::Timeout => write!(f, "window exhausted and no ACK arrived within the deadline"),
            Self::Io(e) => write!(f, "send transport error: {e}"),
        }
    }
}

impl std::error::Error for SendError {}

impl From<std::io::Error> for SendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A handle to one outbound flow-controlled session.
///
/// Lifecycle: `Unbound → Bound → Connected → Disconnected`; see
/// [`crate::state::ConnState`].
pub struct Connection {
    /// Current lifecycle state.
    pub state: ConnState,
    config: ConnectionConfig,
    socket: Option<Socket>,
    peer: Option<SocketAddr>,
    sender: Option<WindowedSender>,
    /// Next sequence number expected from the peer (its ISN + 1); placed in
    /// the ACK field of outbound data segments.
    rcv_nxt: u32,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}

impl Connection {
    /// Create an unbound connection with the given parameters.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnState::Unbound,
            config,
            socket: None,
            peer: None,
            sender: None,
            rcv_nxt: 0,
        }
    }

    /// The resolved local address, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().map(|s| s.local_addr)
    }

    /// The window advertised by the peer, once connected.
    pub fn peer_window(&self) -> Option<u32> {
        self.sender.as_ref().map(|s| s.window())
    }

    /// Bytes currently in flight (transmitted, unacknowledged).
    pub fn in_flight(&self) -> u32 {
        self.sender.as_ref().map_or(0, |s| s.in_flight())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Reserve a local address.
    ///
    /// Passing port `0` lets the OS choose an ephemeral port.  Fails with
    /// [`BindError::AlreadyBound`] unless the connection is still `Unbound`.
    pub async fn bind(&mut self, local: SocketAddr) -> Result<(), BindError> {
        if self.state != ConnState::Unbound {
            return Err(BindError::AlreadyBound);
        }
        let socket = Socket::bind(local).await.map_err(BindError::Unavailable)?;
        log::debug!("[conn] bound to {}", socket.local_addr);
        self.socket = Some(socket);
        self.state = ConnState::Bound;
        Ok(())
    }

    /// Perform the handshake with `peer` and adopt its advertised window.
    ///
    /// The SYN is re-sent with exponential back-off up to
    /// `handshake_max_retries` times; when every attempt goes unanswered the
    /// peer is reported as not listening.
    pub async fn connect(&mut self, peer: SocketAddr) -> Result<(), ConnectError> {
        match self.state {
            ConnState::Bound => {}
            ConnState::Connected => return Err(ConnectError::AlreadyConnected),
            ConnState::Unbound | ConnState::Disconnected => return Err(ConnectError::NotBound),
        }
        let socket = self.socket.as_ref().ok_or(ConnectError::NotBound)?;

        let isn: u32 = rand::random();
        // This side only sends, so it advertises a zero receive window.
        let syn = Segment::control(isn, 0, flags::SYN, 0);
        let mut rto = self.config.handshake_rto;

        for attempt in 0..=self.config.handshake_max_retries {
            socket.send_to(&syn, peer).await?;
            log::debug!("[conn] → SYN seq={isn} (attempt {attempt})");

            // Each attempt gets one RTO budget.  Stale segments from the peer
            // (old ACKs, an RST from an earlier run) are skipped without
            // restarting the clock, so stray traffic cannot burn retries.
            let deadline = tokio::time::Instant::now() + rto;
            loop {
                let seg = match tokio::time::timeout_at(deadline, socket.recv_from_peer(peer))
                    .await
                {
                    Ok(seg) => seg?,
                    Err(_elapsed) => {
                        rto = (rto * 2).min(Duration::from_secs(10));
                        break; // resend the SYN
                    }
                };
                let h = &seg.header;
                let synack = flags::SYN | flags::ACK;
                if h.flags & synack != synack || h.ack != isn.wrapping_add(1) {
                    continue;
                }

                // Flow control needs a non-zero budget to make progress.
                let window = h.window.max(1);
                let ack =
                    Segment::control(isn.wrapping_add(1), h.seq.wrapping_add(1), flags::ACK, 0);
                socket.send_to(&ack, peer).await?;

                self.sender = Some(WindowedSender::new(isn.wrapping_add(1), window));
                self.rcv_nxt = h.seq.wrapping_add(1);
                self.peer = Some(peer);
                self.state = ConnState::Connected;
                log::debug!("[conn] ← SYN-ACK; established, peer window={window}");
                return Ok(());
            }
        }

        log::debug!("[conn] handshake with {peer} exhausted all retries");
        Err(ConnectError::PeerNotListening)
    }

    /// Stream `payload` to the peer under window-based flow control.
    ///
    /// Chunks are admitted only while `in_flight + chunk_len <= window`.
    /// When the window fills, the call waits up to `ack_wait` for an ACK that
    /// opens it again; if none arrives it fails with [`SendError::Timeout`],
    /// having transmitted exactly one full window.  A payload no larger than
    /// the window therefore always completes without needing any ACK.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SendError> {
        if self.state != ConnState::Connected {
            return Err(SendError::NotConnected);
        }
        let (socket, peer) = match (&self.socket, self.peer) {
            (Some(s), Some(p)) => (s, p),
            _ => return Err(SendError::NotConnected),
        };
        let sender = self.sender.as_mut().ok_or(SendError::NotConnected)?;

        let mut offset = 0usize;
        while offset < payload.len() {
            let chunk_len = sender.next_chunk_len(payload.len() - offset, self.config.mss);

            if chunk_len == 0 {
                // Window full: stall until an ACK opens it or the deadline fires.
                let deadline = tokio::time::sleep(self.config.ack_wait);
                tokio::pin!(deadline);

                log::debug!(
                    "[conn] window full ({} bytes in flight), awaiting ACK",
                    sender.in_flight()
                );

                loop {
                    tokio::select! {
                        result = socket.recv_from_peer(peer) => {
                            let seg = result?;
                            if seg.header.flags & flags::ACK != 0 {
                                let opened = sender.on_ack(seg.header.ack);
                                if opened > 0 {
                                    log::debug!(
                                        "[conn] ← ACK ack={} opened {opened} bytes",
                                        seg.header.ack
                                    );
                                    break;
                                }
                            }
                        }
                        _ = &mut deadline => {
                            log::debug!(
                                "[conn] no ACK within {:?}; {} bytes sent before stall",
                                self.config.ack_wait,
                                sender.total_sent()
                            );
                            return Err(SendError::Timeout);
                        }
                    }
                }
                continue;
            }

            let chunk = payload[offset..offset + chunk_len].to_vec();
            let seg = sender.build_data_segment(chunk, self.rcv_nxt, 0);
            socket.send_to(&seg, peer).await?;
            sender.record_sent(chunk_len);
            offset += chunk_len;
            log::trace!(
                "[conn] → DATA seq={} len={chunk_len} in_flight={}",
                seg.header.seq,
                sender.in_flight()
            );
        }

        Ok(())
    }

    /// Tear the connection down.
    ///
    /// Sends a best-effort FIN when established, then releases the socket.
    /// Idempotent: safe to call repeatedly and after a failed `send`.
    pub async fn disconnect(&mut self) {
        if self.state == ConnState::Disconnected {
            return;
        }
        if self.state == ConnState::Connected {
            if let (Some(socket), Some(peer), Some(sender)) =
                (&self.socket, self.peer, &self.sender)
            {
                let fin = Segment::control(sender.next_seq, self.rcv_nxt, flags::FIN, 0);
                // Best effort; the peer may already be gone.
                let _ = socket.send_to(&fin, peer).await;
                log::debug!("[conn] → FIN seq={}", sender.next_seq);
            }
        }
        self.socket = None;
        self.peer = None;
        self.sender = None;
        self.state = ConnState::Disconnected;
    }
}
