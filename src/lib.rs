//! `window-flow` — a windowed flow-control send path over UDP, with a
//! scriptable stub peer for deterministic testing.
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────────┐   data segments   ┌───────────────┐
//!  │   Connection   │──────────────────▶│ SimulatedPeer │
//!  │                │                   │  (AckPolicy)  │
//!  │ ┌────────────┐ │   cumulative      └───────┬───────┘
//!  │ │ Windowed   │ │◀──── ACKs ────────────────┘
//!  │ │ Sender     │ │   (or silence)
//!  │ └────────────┘ │
//!  └───────┬────────┘
//!          │ raw UDP datagrams
//!  ┌───────▼────────┐
//!  │     Socket     │  (thin async wrapper around tokio UdpSocket)
//!  └────────────────┘
//! ```
//!
//! The sender may have at most one advertised window's worth of bytes in
//! flight.  Against a peer that never acknowledges, `send` transmits exactly
//! one full window and then fails with a timeout — the behaviour the
//! [`peer::SimulatedPeer`] exists to provoke and verify.
//!
//! Each module has a single responsibility:
//! - [`segment`]    — wire format (serialise / deserialise)
//! - [`socket`]     — async UDP socket abstraction
//! - [`sender`]     — windowed outbound flow-control state
//! - [`connection`] — lifecycle + the blocking send path
//! - [`peer`]       — programmable remote endpoint for tests and demos
//! - [`state`]      — lifecycle state types
//! - [`config`]     — tunable timeouts and chunk sizing

pub mod config;
pub mod connection;
pub mod peer;
pub mod segment;
pub mod sender;
pub mod socket;
pub mod state;
