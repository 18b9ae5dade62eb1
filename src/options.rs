//! Retry configuration applied when a socket is constructed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

const RECONNECTION_ATTEMPTS: u32 = 5;
const RECONNECTION_DELAY: Duration = Duration::from_millis(1000);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Reconnection and timeout options handed to the socket at construction.
///
/// The initializer always passes [`ConnectOptions::default`]; the values are
/// fixed and independent of the target address. Serializes with the option
/// names used on the wire by push-messaging clients, durations in
/// milliseconds:
///
/// ```
/// use push_socket::ConnectOptions;
///
/// let json = serde_json::to_value(ConnectOptions::default()).unwrap();
/// assert_eq!(
///     json,
///     serde_json::json!({
///         "reconnection": true,
///         "reconnectionAttempts": 5,
///         "reconnectionDelay": 1000,
///         "timeout": 20000
///     })
/// );
/// ```
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    /// Whether the socket reconnects on its own after a failure or drop
    pub reconnection: bool,
    /// Consecutive failed attempts tolerated before the socket gives up
    pub reconnection_attempts: u32,
    /// Delay before the first reconnection attempt
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub reconnection_delay: Duration,
    /// Time allowed for a single connection attempt
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            reconnection: true,
            reconnection_attempts: RECONNECTION_ATTEMPTS,
            reconnection_delay: RECONNECTION_DELAY,
            timeout: CONNECT_TIMEOUT,
        }
    }
}
