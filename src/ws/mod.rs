//! WebSocket-backed socket.
//!
//! **Feature flag:** `ws` (enabled by default)
//!
//! The default [`Socket`](crate::Socket) implementation: a connection manager
//! over `tokio-tungstenite` that dials with a timeout, reconnects with
//! exponential backoff, keeps the link alive with PING frames and reports
//! `connect`, `connect_error` and `disconnect` to registered observers.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: Generic connection handler with heartbeat and reconnection
//! - [`MessageParser`]: Trait for parsing incoming frames
//! - [`WebSocket`]: Connection manager for JSON [`Message`] envelopes
//! - [`WebSocketFactory`]: [`SocketFactory`](crate::SocketFactory) producing [`WebSocket`]s
//!
//! # Example
//!
//! ```rust, no_run
//! use futures::StreamExt as _;
//! use push_socket::ws::WebSocket;
//!
//! # async fn run(socket: WebSocket) -> push_socket::Result<()> {
//! socket.emit("subscribe", serde_json::json!({ "task_id": "42" }))?;
//!
//! let updates = socket.on_message("task_update:42");
//! let mut updates = Box::pin(updates);
//! while let Some(update) = updates.next().await {
//!     println!("{:?}", update?.data);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use message::{JsonParser, Message, WebSocket, WebSocketFactory};
pub use traits::*;
