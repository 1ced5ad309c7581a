//! Connection states and link events.

use asm_protocol::{DecodedEvent, ProtocolError};

/// Connection state of the link.
///
/// ```text
/// Disconnected ──connect──▶ Connecting ──ok──▶ Connected
///      ▲                        │                  │ EOF / read error
///      └────────failed──────────┘                  ▼
///      └──────────retries exhausted────────── Reconnecting ──ok──▶ Connected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// No connection and no automatic retry pending.
    Disconnected,
    /// A user-initiated connect is in progress.
    Connecting,
    /// Connected; the read loop is running.
    Connected,
    /// The connection was lost and automatic retries are scheduled.
    Reconnecting,
}

impl LinkState {
    /// Human-readable state name as shown to the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "Disconnected",
            LinkState::Connecting => "Connecting",
            LinkState::Connected => "Connected",
            LinkState::Reconnecting => "Reconnecting",
        }
    }

    /// Whether the link currently has an open socket.
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTrigger {
    /// The operator asked for it; resets the retry counter.
    Manual,
    /// The reconnect timer fired.
    Automatic,
}

impl ConnectTrigger {
    /// Label value used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectTrigger::Manual => "manual",
            ConnectTrigger::Automatic => "automatic",
        }
    }
}

/// Events delivered from the link to its consumer, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection state changed, or the retry counter moved while reconnecting.
    StateChanged {
        /// New state.
        state: LinkState,
        /// Failed automatic retries so far.
        reconnect_attempts: u32,
    },

    /// An established connection was lost.
    ConnectionLost {
        /// Why the read loop stopped.
        reason: String,
    },

    /// A record decoded from an inbound frame.
    Record(DecodedEvent),

    /// A record in an inbound frame could not be decoded and was skipped.
    DecodeError(ProtocolError),
}
