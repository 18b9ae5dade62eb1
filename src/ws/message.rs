//! JSON message envelopes and the [`WebSocket`] built on them.

use async_stream::stream;
use bon::Builder;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

use super::config::Config;
use super::connection::ConnectionManager;
use super::error::WsError;
use super::traits::MessageParser;
use crate::Result;
use crate::error::Error;
use crate::options::ConnectOptions;
use crate::socket::SocketFactory;

/// Application message exchanged over the socket.
///
/// ```
/// use push_socket::ws::Message;
///
/// let message = Message::builder()
///     .event("subscribe")
///     .data(serde_json::json!({ "task_id": "42" }))
///     .build();
/// assert_eq!(
///     serde_json::to_string(&message).unwrap(),
///     r#"{"event":"subscribe","data":{"task_id":"42"}}"#
/// );
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct Message {
    /// Event name, e.g. `task_update:42`
    #[builder(into)]
    pub event: String,
    #[serde(default)]
    #[builder(default)]
    pub data: Value,
}

/// Parse a frame holding one message or an array of messages.
///
/// Empty or whitespace-only frames are keepalives and yield no messages.
pub fn parse_messages<M: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<M>> {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&[][..], |start| &bytes[start..]);

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    // Try parsing as array first, fall back to single object
    if trimmed.first() == Some(&b'[') {
        serde_json::from_slice(trimmed).map_err(|e| WsError::MessageParse(e).into())
    } else {
        let message: M = serde_json::from_slice(trimmed).map_err(WsError::MessageParse)?;
        Ok(vec![message])
    }
}

/// Parses frames as JSON with [`parse_messages`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl<M: DeserializeOwned> MessageParser<M> for JsonParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<M>> {
        parse_messages(bytes)
    }
}

/// Socket carrying JSON [`Message`] envelopes.
pub type WebSocket = ConnectionManager<Message, JsonParser>;

impl<P: MessageParser<Message>> ConnectionManager<Message, P> {
    /// Queue `data` for the server under `event`.
    pub fn emit<D: Serialize>(&self, event: &str, data: D) -> Result<()> {
        let message = Message::builder()
            .event(event)
            .data(serde_json::to_value(data)?)
            .build();
        self.send(&message)
    }

    /// Stream of incoming messages whose event name equals `event`.
    ///
    /// Yields [`WsError::Lagged`] when the consumer falls too far behind, then
    /// keeps streaming. Ends once the connection task has stopped and every
    /// message received before that has been yielded.
    pub fn on_message(&self, event: &str) -> impl Stream<Item = Result<Message>> + use<P> {
        let mut rx = self.subscribe();
        let closed = self.closed_token();
        let target = event.to_owned();

        stream! {
            loop {
                let received = tokio::select! {
                    biased;

                    received = rx.recv() => received,
                    () = closed.cancelled() => break,
                };

                match received {
                    Ok(message) => {
                        if message.event == target {
                            yield Ok(message);
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Message stream for {target} lagged, missed {n} messages");
                        yield Err(Error::from(WsError::Lagged { count: n }));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Builds [`WebSocket`]s from a base [`Config`] and per-call [`ConnectOptions`].
///
/// Options decide reconnection and timeouts; the base config supplies the
/// heartbeat and backoff shape.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct WebSocketFactory {
    pub base: Config,
}

impl WebSocketFactory {
    #[must_use]
    pub fn new(base: Config) -> Self {
        Self { base }
    }
}

impl SocketFactory for WebSocketFactory {
    type Socket = WebSocket;

    fn create(&self, address: &str, options: &ConnectOptions) -> Result<WebSocket> {
        let config = self.base.clone().with_options(options);
        WebSocket::new(address, config, JsonParser::default())
    }
}
