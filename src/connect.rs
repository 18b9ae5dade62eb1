//! Connection initializer.
//!
//! [`Connector::connect`] builds a socket with the fixed [`ConnectOptions`],
//! attaches diagnostic observers for `connect`, `connect_error` and
//! `disconnect`, starts it and hands it back. Any failure along the way is
//! logged once and returned as an [`InitError`]; retrying after a failure
//! means calling `connect` again.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::error::{Error, Kind};
use crate::event::{Event, EventKind};
use crate::options::ConnectOptions;
use crate::socket::{Socket, SocketFactory};

/// Failure to produce a connection handle.
///
/// The push feature should be treated as unavailable by the caller.
#[derive(Debug)]
pub struct InitError {
    address: String,
    source: Error,
}

impl InitError {
    /// Address the failed call was made with.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.source.kind()
    }

    #[must_use]
    pub fn into_inner(self) -> Error {
        self.source
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to initialize connection to {}: {}",
            self.address, self.source
        )
    }
}

impl StdError for InitError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

/// Opens sockets through `F` and reports their lifecycle to `D`.
///
/// # Example
///
/// ```rust, no_run
/// use push_socket::Connector;
/// use push_socket::diagnostics::TracingDiagnostics;
/// use push_socket::ws::WebSocketFactory;
///
/// #[tokio::main]
/// async fn main() {
///     let diagnostics = TracingDiagnostics::default();
///     let connector = Connector::new(WebSocketFactory::default(), diagnostics);
///
///     match connector.connect("ws://localhost:10001") {
///         Ok(socket) => println!("state: {:?}", socket.state()),
///         Err(e) => eprintln!("push updates unavailable: {e}"),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Connector<F, D = TracingDiagnostics> {
    factory: F,
    diagnostics: Arc<D>,
}

impl<F: SocketFactory, D: Diagnostics> Connector<F, D> {
    pub fn new(factory: F, diagnostics: D) -> Self {
        Self {
            factory,
            diagnostics: Arc::new(diagnostics),
        }
    }

    /// Open a socket to `address` with the fixed retry policy and diagnostic observers.
    ///
    /// No validation of `address` is done here; the factory decides what it accepts.
    pub fn connect(&self, address: &str) -> Result<F::Socket, InitError> {
        self.diagnostics
            .info(&format!("Attempting to connect to {address}"));

        self.try_connect(address).map_err(|source| {
            self.diagnostics.error(&format!(
                "Failed to initialize connection to {address}: {source}"
            ));
            InitError {
                address: address.to_owned(),
                source,
            }
        })
    }

    fn try_connect(&self, address: &str) -> crate::Result<F::Socket> {
        let socket = self.factory.create(address, &ConnectOptions::default())?;

        let diagnostics = Arc::clone(&self.diagnostics);
        let target = address.to_owned();
        socket.on(
            EventKind::Connect,
            Arc::new(move |_| diagnostics.info(&format!("Connected to {target}"))),
        )?;

        let diagnostics = Arc::clone(&self.diagnostics);
        let target = address.to_owned();
        socket.on(
            EventKind::ConnectError,
            Arc::new(move |event| {
                if let Event::ConnectError(error) = event {
                    diagnostics.error(&format!("Connection error on {target}: {error}"));
                }
            }),
        )?;

        let diagnostics = Arc::clone(&self.diagnostics);
        let target = address.to_owned();
        socket.on(
            EventKind::Disconnect,
            Arc::new(move |event| {
                if let Event::Disconnect(reason) = event {
                    diagnostics.info(&format!("Disconnected from {target} ({reason})"));
                }
            }),
        )?;

        socket.open()?;

        Ok(socket)
    }
}

#[cfg(feature = "ws")]
impl Default for Connector<crate::ws::WebSocketFactory, TracingDiagnostics> {
    fn default() -> Self {
        Self::new(crate::ws::WebSocketFactory::default(), TracingDiagnostics)
    }
}

/// Open a WebSocket connection to `address`, logging its lifecycle through [`tracing`].
///
/// Must be called from within a tokio runtime; otherwise an [`InitError`] is returned.
#[cfg(feature = "ws")]
pub fn connect(address: &str) -> Result<crate::ws::WebSocket, InitError> {
    Connector::default().connect(address)
}
