//! Capability set a connection implementation must provide.
//!
//! [`Connector`](crate::Connector) is written against these traits rather than a
//! concrete socket, so the WebSocket implementation in [`crate::ws`] and any
//! test double are interchangeable.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::Result;
use crate::event::{Event, EventKind};
use crate::options::ConnectOptions;

/// Callback bound to a lifecycle event.
pub type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

/// A live or attempting connection.
pub trait Socket: Send + Sync + 'static {
    /// Register `observer` to be called every time an event of `kind` fires.
    fn on(&self, kind: EventKind, observer: Observer) -> Result<()>;

    /// Begin connecting.
    ///
    /// Implementations must not fire lifecycle events before this is called,
    /// and calling it more than once has no further effect.
    fn open(&self) -> Result<()>;
}

/// Constructs sockets for a target address.
pub trait SocketFactory {
    type Socket: Socket;

    /// Build a socket for `address` using `options`.
    ///
    /// Address validation, if any, happens here.
    fn create(&self, address: &str, options: &ConnectOptions) -> Result<Self::Socket>;
}

/// Observers registered on a socket, keyed by event.
///
/// Cheap to clone; clones share the same registrations.
#[derive(Clone, Default)]
pub struct Observers {
    inner: Arc<DashMap<EventKind, Vec<Observer>>>,
}

impl Observers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: EventKind, observer: Observer) {
        self.inner.entry(kind).or_default().push(observer);
    }

    /// Invoke every observer registered for the event's kind.
    ///
    /// Returns the number of observers called.
    pub fn dispatch(&self, event: &Event) -> usize {
        // Clone out so observers may register further observers without deadlocking
        let observers = self
            .inner
            .get(&event.kind())
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        for observer in &observers {
            observer(event);
        }

        observers.len()
    }

    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.inner.get(&kind).map_or(0, |entry| entry.len())
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind, &self.count(kind));
        }
        map.finish()
    }
}
