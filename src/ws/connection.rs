#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval_at, sleep, sleep_until, timeout};
use tokio_tungstenite::tungstenite::{Bytes, Message as Frame};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::{CancellationToken, DropGuard};
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::traits::MessageParser;
use crate::Result;
use crate::error::Error;
use crate::event::{ConnectError, DisconnectReason, Event, EventKind};
use crate::socket::{Observer, Observers, Socket};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for incoming messages.
const BROADCAST_CAPACITY: usize = 1024;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Reconnecting after failure
    Reconnecting {
        /// Current reconnection attempt number
        attempt: u32,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Manages WebSocket connection lifecycle, reconnection, and heartbeat.
///
/// Nothing is dialed until [`Socket::open`] is called, so observers registered
/// with [`Socket::on`] beforehand see every lifecycle event. Once open, a
/// background task:
/// - Establishes the connection within `connect_timeout`
/// - Reconnects with exponential backoff up to `max_attempts` times
/// - Sends PING frames and drops the link when no PONG arrives in time
/// - Broadcasts parsed incoming messages to every subscriber
///
/// Clones share the same connection. The background task stops once
/// [`disconnect`](Self::disconnect) is called or the last clone is dropped.
///
/// # Type Parameters
///
/// - `M`: Message type that implements [`DeserializeOwned`] among other "helper" types
/// - `P`: Parser type that implements [`MessageParser<M>`]
pub struct ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    inner: Arc<Inner<M, P>>,
}

impl<M, P> Clone for ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<M, P> {
    endpoint: Url,
    config: Config,
    observers: Observers,
    /// Watch channel sender for state changes (enables reconnection detection)
    state_tx: watch::Sender<ConnectionState>,
    /// Watch channel receiver for state changes (for use in checking the current state)
    state_rx: watch::Receiver<ConnectionState>,
    /// Sender channel for outgoing messages
    sender_tx: mpsc::UnboundedSender<String>,
    /// Broadcast sender for incoming messages
    broadcast_tx: broadcast::Sender<M>,
    /// Outgoing queue and parser, held until the connection task is spawned
    pending: Mutex<Option<Pending<P>>>,
    cancel: CancellationToken,
    /// Cancelled by the connection task when it returns
    closed: CancellationToken,
    _cancel_on_drop: DropGuard,
}

struct Pending<P> {
    sender_rx: mpsc::UnboundedReceiver<String>,
    parser: P,
}

impl<M, P> ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Create a new connection manager for `endpoint`.
    ///
    /// The endpoint must be an absolute `ws`, `wss`, `http` or `https` URL;
    /// `http(s)` is dialed as `ws(s)`. The `parser` is used to deserialize
    /// incoming WebSocket messages.
    pub fn new(endpoint: &str, config: Config, parser: P) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint)?;
        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        Ok(Self {
            inner: Arc::new(Inner {
                endpoint,
                config,
                observers: Observers::new(),
                state_tx,
                state_rx,
                sender_tx,
                broadcast_tx,
                pending: Mutex::new(Some(Pending { sender_rx, parser })),
                _cancel_on_drop: cancel.clone().drop_guard(),
                cancel,
                closed: CancellationToken::new(),
            }),
        })
    }

    /// Spawn the connection task on the current tokio runtime, once.
    fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::initialization(format!("no tokio runtime to drive the connection: {e}"))
        })?;

        // Recovering from a poisoned lock is fine: the slot is either taken or not.
        let Some(Pending { sender_rx, parser }) = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Ok(());
        };

        let driver = Driver {
            endpoint: self.inner.endpoint.to_string(),
            config: self.inner.config.clone(),
            observers: self.inner.observers.clone(),
            state_tx: self.inner.state_tx.clone(),
            broadcast_tx: self.inner.broadcast_tx.clone(),
            cancel: self.inner.cancel.clone(),
            closed: self.inner.closed.clone(),
            sender_rx,
            parser,
        };

        runtime.spawn(driver.connection_loop());

        Ok(())
    }

    /// Queue a JSON-serialized request for the server.
    ///
    /// Requests sent before the connection is up are delivered once it is.
    pub fn send<R: Serialize>(&self, request: &R) -> Result<()> {
        let json = serde_json::to_string(request)?;
        self.inner
            .sender_tx
            .send(json)
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Fires `disconnect` with [`DisconnectReason::ClientDisconnect`] if the
    /// socket was connected.
    pub fn disconnect(&self) {
        self.inner.cancel.cancel();
    }

    /// URL that is dialed.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can
    /// receive messages concurrently without blocking each other.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<M> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether the connection task has stopped for good.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Token cancelled once the connection task has stopped.
    pub(super) fn closed_token(&self) -> CancellationToken {
        self.inner.closed.clone()
    }
}

impl<M, P> Socket for ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    fn on(&self, kind: EventKind, observer: Observer) -> Result<()> {
        self.inner.observers.register(kind, observer);
        Ok(())
    }

    fn open(&self) -> Result<()> {
        self.start()
    }
}

impl<M, P> fmt::Debug for ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("state", &self.state())
            .field("observers", &self.inner.observers)
            .finish_non_exhaustive()
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;

    let scheme = match url.scheme() {
        "ws" | "wss" => return Ok(url),
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::validation(format!(
                "unsupported scheme `{other}` in {endpoint}"
            )));
        }
    };

    url.set_scheme(scheme)
        .map_err(|()| Error::validation(format!("cannot dial {endpoint} as {scheme}")))?;

    Ok(url)
}

/// State owned by the background connection task.
struct Driver<M, P> {
    endpoint: String,
    config: Config,
    observers: Observers,
    state_tx: watch::Sender<ConnectionState>,
    broadcast_tx: broadcast::Sender<M>,
    cancel: CancellationToken,
    closed: CancellationToken,
    sender_rx: mpsc::UnboundedReceiver<String>,
    parser: P,
}

impl<M, P> Driver<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Main connection loop with automatic reconnection.
    async fn connection_loop(mut self) {
        let mut attempt = 0_u32;
        let mut backoff: backoff::ExponentialBackoff = self.config.reconnect.clone().into();

        loop {
            _ = self.state_tx.send(ConnectionState::Connecting);

            let dial = tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,
                result = timeout(
                    self.config.connect_timeout,
                    connect_async(self.endpoint.as_str()),
                ) => result,
            };

            let should_retry = match dial {
                Ok(Ok((ws_stream, _))) => {
                    attempt = 0;
                    backoff.reset();
                    _ = self.state_tx.send(ConnectionState::Connected {
                        since: Instant::now(),
                    });
                    tracing::debug!(endpoint = %self.endpoint, "WebSocket connected");
                    self.observers.dispatch(&Event::Connect);

                    let reason = self.handle_connection(ws_stream).await;

                    _ = self.state_tx.send(ConnectionState::Disconnected);
                    tracing::debug!(endpoint = %self.endpoint, %reason, "WebSocket disconnected");
                    self.observers.dispatch(&Event::Disconnect(reason));

                    // Deliberate closes from either side are not retried
                    !matches!(
                        reason,
                        DisconnectReason::ClientDisconnect | DisconnectReason::ServerDisconnect
                    )
                }
                Ok(Err(e)) => {
                    self.report_connect_error(&WsError::Connection(e));
                    true
                }
                Err(_elapsed) => {
                    self.report_connect_error(&WsError::Timeout);
                    true
                }
            };

            if !should_retry || !self.config.reconnect.enabled {
                break;
            }

            // Check if we should stop reconnecting
            if let Some(max) = self.config.reconnect.max_attempts
                && attempt >= max
            {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    "Giving up after {attempt} reconnection attempts"
                );
                break;
            }

            attempt = attempt.saturating_add(1);
            _ = self.state_tx.send(ConnectionState::Reconnecting { attempt });

            if let Some(duration) = backoff.next_backoff() {
                tokio::select! {
                    biased;

                    () = self.cancel.cancelled() => break,
                    () = sleep(duration) => {}
                }
            }
        }

        _ = self.state_tx.send(ConnectionState::Disconnected);
        self.closed.cancel();
    }

    fn report_connect_error(&self, error: &WsError) {
        tracing::warn!(endpoint = %self.endpoint, "Unable to connect: {error}");
        self.observers
            .dispatch(&Event::ConnectError(ConnectError::new(error.to_string())));
    }

    /// Drive an established connection until it ends, returning why it ended.
    async fn handle_connection(&mut self, ws_stream: WsStream) -> DisconnectReason {
        let (mut write, mut read) = ws_stream.split();

        // A zero interval disables PINGs; `interval_at` itself rejects zero
        let heartbeat_interval = self.config.heartbeat_interval;
        let heartbeat_enabled = !heartbeat_interval.is_zero();
        let period = heartbeat_interval.max(Duration::from_millis(1));
        let mut ping_interval = interval_at(tokio::time::Instant::now() + period, period);
        // Set while a PING is outstanding
        let mut pong_deadline: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                // Handle incoming frames
                frame = read.next() => {
                    match frame {
                        Some(Ok(Frame::Text(text))) => {
                            tracing::trace!(%text, "Received WebSocket text message");
                            self.broadcast(text.as_bytes());
                        }
                        Some(Ok(Frame::Binary(bytes))) => self.broadcast(&bytes),
                        Some(Ok(Frame::Pong(_))) => pong_deadline = None,
                        Some(Ok(Frame::Close(frame))) => {
                            tracing::debug!(?frame, "Server closed the connection");
                            return DisconnectReason::ServerDisconnect;
                        }
                        Some(Ok(_)) => {
                            // PINGs are answered by tungstenite itself
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WebSocket read failed");
                            return DisconnectReason::TransportError;
                        }
                        None => return DisconnectReason::TransportClose,
                    }
                }

                // Handle outgoing messages
                Some(text) = self.sender_rx.recv() => {
                    if let Err(e) = write.send(Frame::Text(text.into())).await {
                        tracing::warn!(error = %e, "WebSocket write failed");
                        return DisconnectReason::TransportError;
                    }
                }

                _ = ping_interval.tick(), if heartbeat_enabled => {
                    if write.send(Frame::Ping(Bytes::new())).await.is_err() {
                        return DisconnectReason::TransportError;
                    }
                    if pong_deadline.is_none() {
                        pong_deadline =
                            Some(tokio::time::Instant::now() + self.config.heartbeat_timeout);
                    }
                }

                () = sleep_until(pong_deadline.unwrap_or_else(tokio::time::Instant::now)),
                    if pong_deadline.is_some() =>
                {
                    tracing::warn!(
                        "Heartbeat timeout: no PONG received within {:?}",
                        self.config.heartbeat_timeout
                    );
                    return DisconnectReason::PingTimeout;
                }

                () = self.cancel.cancelled() => {
                    _ = write.send(Frame::Close(None)).await;
                    return DisconnectReason::ClientDisconnect;
                }
            }
        }
    }

    fn broadcast(&self, bytes: &[u8]) {
        match self.parser.parse(bytes) {
            Ok(messages) => {
                for message in messages {
                    tracing::trace!(?message, "Parsed WebSocket message");
                    _ = self.broadcast_tx.send(message);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse WebSocket message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt as _;
    use serde_json::Value;

    use super::*;
    use crate::error::Kind;
    use crate::ws::{JsonParser, Message, WebSocket};

    type ValueSocket = ConnectionManager<Value, JsonParser>;

    #[test]
    fn http_schemes_are_dialed_as_websocket() {
        let plain = normalize_endpoint("http://localhost:10001/socket").unwrap();
        let secure = normalize_endpoint("https://push.example.com").unwrap();

        assert_eq!(plain.as_str(), "ws://localhost:10001/socket");
        assert_eq!(secure.as_str(), "wss://push.example.com/");
    }

    #[test]
    fn websocket_schemes_are_kept() {
        let url = normalize_endpoint("wss://push.example.com/live").unwrap();

        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let error = normalize_endpoint("ftp://push.example.com").unwrap_err();

        assert_eq!(error.kind(), Kind::Validation);
    }

    #[test]
    fn rejects_relative_address() {
        let error = normalize_endpoint("").unwrap_err();

        assert_eq!(error.kind(), Kind::Validation);
    }

    #[test]
    fn open_without_runtime_is_initialization_error() {
        let socket = ValueSocket::new("ws://127.0.0.1:1", Config::default(), JsonParser).unwrap();

        let error = socket.open().unwrap_err();

        assert_eq!(error.kind(), Kind::Initialization);
        assert_eq!(socket.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn send_before_open_is_queued() {
        let socket = ValueSocket::new("ws://127.0.0.1:1", Config::default(), JsonParser).unwrap();

        socket
            .send(&serde_json::json!({ "task_id": "1" }))
            .expect("queueing before open should succeed");
    }

    #[tokio::test]
    async fn disconnect_before_connect_fires_nothing() {
        let socket = ValueSocket::new("ws://127.0.0.1:1", Config::default(), JsonParser).unwrap();
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for kind in EventKind::ALL {
            let fired = Arc::clone(&fired);
            socket
                .on(
                    kind,
                    Arc::new(move |_| {
                        fired.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }),
                )
                .unwrap();
        }

        socket.disconnect();
        socket.open().unwrap();

        // The task sees the cancelled token before dialing
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(socket.state(), ConnectionState::Disconnected);
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(socket.is_closed(), "task should have stopped");
    }

    #[tokio::test]
    async fn lagged_stream_reports_and_keeps_streaming() {
        let socket = WebSocket::new("ws://127.0.0.1:1", Config::default(), JsonParser).unwrap();
        let mut updates = Box::pin(socket.on_message("tick"));

        for _ in 0..BROADCAST_CAPACITY + 10 {
            _ = socket
                .inner
                .broadcast_tx
                .send(Message::builder().event("tick").build());
        }

        let lagged = updates.next().await.unwrap().unwrap_err();
        assert!(
            matches!(
                lagged.downcast_ref::<WsError>(),
                Some(WsError::Lagged { count: 10 })
            ),
            "expected a lag of 10, got {lagged}"
        );

        let next = updates.next().await.unwrap().unwrap();
        assert_eq!(next.event, "tick");

        _ = socket
            .inner
            .broadcast_tx
            .send(Message::builder().event("tick").build());
        let mut delivered = 0;
        while let Ok(Some(Ok(_))) =
            tokio::time::timeout(Duration::from_millis(50), updates.next()).await
        {
            delivered += 1;
        }
        assert_eq!(delivered, BROADCAST_CAPACITY, "buffer plus the late message");
    }

    #[tokio::test]
    async fn stream_ends_after_task_stops() {
        let socket = WebSocket::new("ws://127.0.0.1:1", Config::default(), JsonParser).unwrap();
        let mut updates = Box::pin(socket.on_message("tick"));

        _ = socket
            .inner
            .broadcast_tx
            .send(Message::builder().event("tick").build());
        socket.disconnect();
        socket.open().unwrap();

        let buffered = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .unwrap();
        assert!(matches!(buffered, Some(Ok(_))), "buffered message comes first");

        let end = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .unwrap();
        assert!(end.is_none(), "stream should end once the task stops");
    }
}
