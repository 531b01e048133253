//! Tunable connection parameters.
//!
//! The acknowledgment deadline is deliberately a runtime parameter rather
//! than a compile-time constant so tests can use short deadlines and stay
//! fast without a simulated clock.

use std::time::Duration;

/// Adjustable parameters for one [`crate::connection::Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum payload bytes per data segment.
    ///
    /// Chunks are additionally capped by the available window, so the last
    /// chunk before a stall may be smaller.
    pub mss: usize,

    /// How long `send` waits for an ACK once the window is full before
    /// giving up with a timeout.
    pub ack_wait: Duration,

    /// Initial wait for a SYN-ACK during the handshake.
    pub handshake_rto: Duration,

    /// How many times the SYN is re-sent (with doubled `handshake_rto`)
    /// before `connect` reports the peer as not listening.
    pub handshake_max_retries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            mss: 1024,
            ack_wait: Duration::from_millis(1000),
            handshake_rto: Duration::from_millis(200),
            handshake_max_retries: 4,
        }
    }
}
