//! Windowed send-side state machine.
//!
//! [`WindowedSender`] tracks how many bytes may be in flight (transmitted but
//! not yet acknowledged) against the window the peer advertised during the
//! handshake.  It is byte-granular: the window is a byte budget, not a
//! segment count, so a single large payload is admitted chunk by chunk until
//! the budget is spent.
//!
//! # Flow-control contract
//!
//! - `in_flight()` never exceeds `window()`.
//! - A chunk of `n` bytes may only be admitted while `in_flight() + n <= window()`.
//! - ACKs are **cumulative**: `ack = K` means the peer has accepted all bytes
//!   up to (but not including) sequence number `K`.
//! - Sequence numbers are `u32` and wrap; wrap-around comparisons use the
//!   convention that two sequence numbers are "close" when their difference
//!   is less than `u32::MAX / 2`.
//!
//! This module only manages state; all socket I/O and all waiting for ACKs
//! is the caller's responsibility ([`crate::connection::Connection`]).

use crate::segment::{flags, Segment, SegmentHeader};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns `true` when sequence number `a` is ≤ `b` in wrap-around space.
///
/// The comparison works correctly as long as the two values are less than
/// `u32::MAX / 2` apart, which is always the case for a reasonable window.
#[inline]
fn seq_le(a: u32, b: u32) -> bool {
    b.wrapping_sub(a) <= (u32::MAX / 2)
}

// ---------------------------------------------------------------------------
// WindowedSender
// ---------------------------------------------------------------------------

/// Send-side flow-control state for one connection.
///
/// # Sequence-number layout
///
/// ```text
///  send_base          next_seq        send_base + window
///      │                  │                  │
///  ────┼──────────────────┼──────────────────┼───▶ seq space (bytes)
///      │ <── in flight ──▶│ <── available ──▶│
/// ```
#[derive(Debug)]
pub struct WindowedSender {
    /// Sequence number of the oldest unacked byte (left window edge).
    pub send_base: u32,

    /// Sequence number of the next byte to transmit.
    pub next_seq: u32,

    /// Peer-advertised window: maximum bytes in flight simultaneously.
    window: u32,

    /// Total bytes handed to the wire over the life of this sender.
    total_sent: u64,
}

impl WindowedSender {
    /// Create a new [`WindowedSender`].
    ///
    /// `seq_start` is the first data sequence number (`ISN + 1` after the
    /// handshake).  `window` is the peer's advertised receive window in
    /// bytes (≥ 1).
    pub fn new(seq_start: u32, window: u32) -> Self {
        assert!(window >= 1, "window must be at least 1 byte");
        Self {
            send_base: seq_start,
            next_seq: seq_start,
            window,
            total_sent: 0,
        }
    }

    /// The peer-advertised window in bytes.
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Bytes transmitted but not yet acknowledged.
    pub fn in_flight(&self) -> u32 {
        self.next_seq.wrapping_sub(self.send_base)
    }

    /// Bytes that may be admitted right now without violating the window.
    pub fn available(&self) -> u32 {
        self.window - self.in_flight()
    }

    /// `true` when at least one more byte may be admitted.
    pub fn can_send(&self) -> bool {
        self.available() > 0
    }

    /// `true` when at least one byte is awaiting acknowledgement.
    pub fn has_unacked(&self) -> bool {
        self.in_flight() > 0
    }

    /// Total bytes handed to the wire since this sender was created.
    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    /// Size of the next admissible chunk: the smallest of the bytes still to
    /// send, the configured `mss`, and the available window.
    ///
    /// Returns `0` when the window is full — the caller must wait for an ACK
    /// before admitting more data.
    pub fn next_chunk_len(&self, remaining: usize, mss: usize) -> usize {
        remaining.min(mss).min(self.available() as usize)
    }

    /// Build a data segment carrying `payload` at the current `next_seq`.
    ///
    /// Call [`record_sent`](Self::record_sent) immediately after handing the
    /// segment to the socket so the window accounting stays in step.
    pub fn build_data_segment(&self, payload: Vec<u8>, ack: u32, window: u32) -> Segment {
        debug_assert!(
            payload.len() as u32 <= self.available(),
            "chunk of {} bytes exceeds available window ({})",
            payload.len(),
            self.available()
        );
        Segment {
            header: SegmentHeader {
                seq: self.next_seq,
                ack,
                flags: flags::ACK, // data segments piggyback the cumulative ACK
                window,
            },
            payload,
        }
    }

    /// Account for a just-transmitted chunk of `len` bytes.
    pub fn record_sent(&mut self, len: usize) {
        debug_assert!(
            len as u32 <= self.available(),
            "record_sent would overfill the window ({} in flight of {})",
            self.in_flight(),
            self.window
        );
        self.next_seq = self.next_seq.wrapping_add(len as u32);
        self.total_sent += len as u64;
    }

    /// Process a cumulative ACK.
    ///
    /// Advances `send_base` and returns the number of newly acknowledged
    /// bytes.  Returns `0` for a duplicate or out-of-range ACK (behind
    /// `send_base` or beyond `next_seq`).
    pub fn on_ack(&mut self, ack: u32) -> u32 {
        if !seq_le(self.send_base, ack) || !seq_le(ack, self.next_seq) {
            return 0;
        }
        let newly_acked = ack.wrapping_sub(self.send_base);
        self.send_base = ack;
        newly_acked
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
