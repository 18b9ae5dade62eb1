//! Core traits for the WebSocket socket.

use serde::de::DeserializeOwned;

/// Message parser trait for converting raw frames to messages.
///
/// # Example
///
/// ```ignore
/// pub struct TaskUpdates;
///
/// impl MessageParser<TaskUpdate> for TaskUpdates {
///     fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<TaskUpdate>> {
///         let update: TaskUpdate = serde_json::from_slice(bytes)?;
///         Ok(vec![update])
///     }
/// }
/// ```
pub trait MessageParser<M: DeserializeOwned>: Send + Sync + 'static {
    /// Parse incoming bytes into messages.
    ///
    /// May return empty vec for keepalive frames or filtered messages.
    /// Handles both single objects and arrays of messages.
    fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<M>>;
}
