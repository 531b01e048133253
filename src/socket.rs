//! Segment-oriented UDP socket.
//!
//! [`Socket`] adapts `tokio::net::UdpSocket` to the segment layer: outbound
//! [`Segment`]s are encoded into single datagrams, inbound datagrams are
//! decoded before protocol code ever sees them.  A datagram that fails to
//! decode is wire noise (truncation, corruption, unrelated traffic) and is
//! dropped here, so callers only deal with well-formed segments or genuine
//! I/O failures.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::segment::Segment;

/// Inbound buffer size: the largest payload the length field can describe.
const RECV_BUF: usize = 65_535;

/// An async UDP socket that speaks [`Segment`].
///
/// All methods take `&self` so the socket can be shared across tasks.
#[derive(Debug)]
pub struct Socket {
    /// Resolved local address (the OS fills in an ephemeral port for `:0`).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind to `local_addr`; port `0` asks the OS for an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Send `segment` to `dest` as one datagram.
    pub async fn send_to(&self, segment: &Segment, dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(&segment.encode(), dest).await?;
        Ok(())
    }

    /// Receive the next decodable segment, with its sender's address.
    ///
    /// Undecodable datagrams are logged and skipped; only I/O failures
    /// surface as errors.
    pub async fn recv_from(&self) -> io::Result<(Segment, SocketAddr)> {
        let mut buf = vec![0u8; RECV_BUF];
        loop {
            let (n, addr) = self.inner.recv_from(&mut buf).await?;
            match Segment::decode(&buf[..n]) {
                Ok(segment) => return Ok((segment, addr)),
                Err(e) => {
                    log::debug!("[socket] dropping undecodable datagram from {addr}: {e}");
                }
            }
        }
    }

    /// Receive the next segment sent by `peer`, ignoring other sources.
    ///
    /// Used on the connected path, where datagrams from strangers carry no
    /// meaning and must not disturb handshake or ACK waits.
    pub async fn recv_from_peer(&self, peer: SocketAddr) -> io::Result<Segment> {
        loop {
            let (segment, addr) = self.recv_from().await?;
            if addr == peer {
                return Ok(segment);
            }
            log::trace!("[socket] ignoring segment from stranger {addr}");
        }
    }
}
