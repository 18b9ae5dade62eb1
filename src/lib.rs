#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod connect;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod options;
pub mod socket;
#[cfg(feature = "ws")]
pub mod ws;

#[cfg(feature = "ws")]
pub use connect::connect;
pub use connect::{Connector, InitError};
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use event::{ConnectError, DisconnectReason, Event, EventKind};
pub use options::ConnectOptions;
pub use socket::{Observer, Observers, Socket, SocketFactory};

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
