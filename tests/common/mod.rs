#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each test binary only uses part of the shared doubles"
)]

use std::sync::{Arc, Mutex};

use push_socket::error::Error;
use push_socket::{
    ConnectOptions, Diagnostics, Event, EventKind, Observer, Observers, Socket, SocketFactory,
};

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Diagnostics sink that keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl RecordingDiagnostics {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap().clear();
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn info(&self, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((Level::Info, message.to_owned()));
    }

    fn error(&self, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((Level::Error, message.to_owned()));
    }
}

/// Socket double recording what the initializer did to it.
#[derive(Debug, Clone)]
pub struct FakeSocket {
    pub address: String,
    pub options: ConnectOptions,
    observers: Observers,
    registered: Arc<Mutex<Vec<EventKind>>>,
    opened: Arc<Mutex<usize>>,
}

impl FakeSocket {
    fn new(address: &str, options: ConnectOptions) -> Self {
        Self {
            address: address.to_owned(),
            options,
            observers: Observers::new(),
            registered: Arc::default(),
            opened: Arc::default(),
        }
    }

    /// Event names registered, in registration order.
    pub fn registered(&self) -> Vec<String> {
        self.registered
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn times_opened(&self) -> usize {
        *self.opened.lock().unwrap()
    }

    /// Simulate the library firing `event`.
    pub fn trigger(&self, event: &Event) -> usize {
        self.observers.dispatch(event)
    }
}

impl Socket for FakeSocket {
    fn on(&self, kind: EventKind, observer: Observer) -> push_socket::Result<()> {
        self.registered.lock().unwrap().push(kind);
        self.observers.register(kind, observer);
        Ok(())
    }

    fn open(&self) -> push_socket::Result<()> {
        *self.opened.lock().unwrap() += 1;
        Ok(())
    }
}

/// How [`FakeFactory::create`] should fail, if at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Failure {
    #[default]
    None,
    Construct,
}

/// Factory double handing out [`FakeSocket`]s and keeping a copy of each.
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    pub failure: Failure,
    created: Arc<Mutex<Vec<FakeSocket>>>,
}

impl FakeFactory {
    pub fn failing() -> Self {
        Self {
            failure: Failure::Construct,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<FakeSocket> {
        self.created.lock().unwrap().clone()
    }
}

impl SocketFactory for FakeFactory {
    type Socket = FakeSocket;

    fn create(&self, address: &str, options: &ConnectOptions) -> push_socket::Result<FakeSocket> {
        if self.failure == Failure::Construct {
            return Err(Error::initialization("library failed to load"));
        }

        let socket = FakeSocket::new(address, *options);
        self.created.lock().unwrap().push(socket.clone());
        Ok(socket)
    }
}
