//! Connection lifecycle states.
//!
//! The handshake here is mocked rather than full TCP, so the lifecycle is a
//! straight line instead of the RFC 793 diagram: a connection is created
//! unbound, acquires a local address, completes the handshake, and is finally
//! torn down.  Transitions are driven by [`crate::connection::Connection`];
//! this module only defines the states so guard logic stays in one place.

/// All possible states of a connection.
///
/// ```text
///  UNBOUND ──bind──▶ BOUND ──connect──▶ CONNECTED ──disconnect──▶ DISCONNECTED
///                                           │
///                                           └── send / timeout (stays CONNECTED)
/// ```
///
/// A send timeout does **not** change state: the connection remains
/// `Connected` and usable, so the caller may retry or disconnect.
/// `disconnect` is legal from every state and is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    /// Freshly created; no local address reserved yet.
    #[default]
    Unbound,
    /// Local address reserved; no peer yet.
    Bound,
    /// Handshake complete; data transfer possible.
    Connected,
    /// Torn down; terminal.
    Disconnected,
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
