//! Lifecycle events reported by a socket.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a lifecycle event an observer can be registered for.
///
/// Displays as the event name used on the wire.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Connect,
    ConnectError,
    Disconnect,
}

impl EventKind {
    /// Every lifecycle event, in the order the initializer registers them.
    pub const ALL: [EventKind; 3] = [Self::Connect, Self::ConnectError, Self::Disconnect];
}

/// Payload delivered with a `connect_error` event.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectError {
    pub message: String,
}

impl ConnectError {
    #[must_use]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Why a connected socket went away.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
pub enum DisconnectReason {
    /// The server closed the connection
    #[strum(serialize = "io server disconnect")]
    #[serde(rename = "io server disconnect")]
    ServerDisconnect,
    /// The client asked to disconnect
    #[strum(serialize = "io client disconnect")]
    #[serde(rename = "io client disconnect")]
    ClientDisconnect,
    /// No PONG arrived within the heartbeat timeout
    #[strum(serialize = "ping timeout")]
    #[serde(rename = "ping timeout")]
    PingTimeout,
    /// The underlying stream ended without a close frame
    #[strum(serialize = "transport close")]
    #[serde(rename = "transport close")]
    TransportClose,
    /// The underlying stream failed
    #[strum(serialize = "transport error")]
    #[serde(rename = "transport error")]
    TransportError,
}

/// A lifecycle event together with its payload.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    ConnectError(ConnectError),
    Disconnect(DisconnectReason),
}

impl Event {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connect => EventKind::Connect,
            Self::ConnectError(_) => EventKind::ConnectError,
            Self::Disconnect(_) => EventKind::Disconnect,
        }
    }
}
