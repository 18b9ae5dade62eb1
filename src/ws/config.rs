#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use bon::Builder;

use crate::options::ConnectOptions;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(25);
const DEFAULT_HEARTBEAT_TIMEOUT_DURATION: Duration = Duration::from_secs(20);
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(20);
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;

/// Configuration for WebSocket client behavior.
///
/// ```
/// use std::time::Duration;
///
/// use push_socket::ws::config::{Config, ReconnectConfig};
///
/// let config = Config::builder()
///     .heartbeat_interval(Duration::from_secs(10))
///     .reconnect(ReconnectConfig::builder().max_attempts(3).build())
///     .build();
/// assert_eq!(config.reconnect.max_attempts, Some(3));
/// assert_eq!(config.connect_timeout, Duration::from_secs(20));
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Interval for sending PING frames to keep connection alive.
    /// Zero disables PINGs and therefore the heartbeat timeout.
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Maximum time to wait for PONG response before considering connection dead
    #[builder(default = DEFAULT_HEARTBEAT_TIMEOUT_DURATION)]
    pub heartbeat_timeout: Duration,
    /// Maximum time a single connection attempt may take
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::from(&ConnectOptions::default())
    }
}

impl Config {
    /// Apply `options` on top of this config, keeping heartbeat and backoff shape.
    #[must_use]
    pub fn with_options(mut self, options: &ConnectOptions) -> Self {
        self.connect_timeout = options.timeout;
        self.reconnect.enabled = options.reconnection;
        self.reconnect.max_attempts = Some(options.reconnection_attempts);
        self.reconnect.initial_backoff = options.reconnection_delay;
        self.reconnect.max_backoff = self.reconnect.max_backoff.max(options.reconnection_delay);
        self
    }
}

impl From<&ConnectOptions> for Config {
    fn from(options: &ConnectOptions) -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_DURATION,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT_DURATION,
            connect_timeout: options.timeout,
            reconnect: ReconnectConfig::default(),
        }
        .with_options(options)
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Whether to reconnect at all after a failed attempt or a dropped connection
    #[builder(default = true)]
    pub enabled: bool,
    /// Maximum number of consecutive reconnection attempts before giving up.
    /// `None` means infinite retries, which is also what the builder leaves
    /// when unset. The count restarts after every successful connection.
    pub max_attempts: Option<u32>,
    /// Initial backoff duration for first reconnection attempt
    #[builder(default = DEFAULT_INITIAL_BACKOFF_DURATION)]
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    #[builder(default = DEFAULT_MAX_BACKOFF_DURATION)]
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    #[builder(default = DEFAULT_BACKOFF_MULTIPLIER)]
    pub backoff_multiplier: f64,
    /// Jitter applied to each backoff, as a fraction of the interval
    #[builder(default = DEFAULT_RANDOMIZATION_FACTOR)]
    pub randomization_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let options = ConnectOptions::default();
        Self::builder()
            .enabled(options.reconnection)
            .max_attempts(options.reconnection_attempts)
            .initial_backoff(options.reconnection_delay)
            .build()
    }
}

impl From<ReconnectConfig> for ExponentialBackoff {
    fn from(config: ReconnectConfig) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(config.initial_backoff)
            .with_max_interval(config.max_backoff)
            .with_multiplier(config.backoff_multiplier)
            .with_randomization_factor(config.randomization_factor)
            .with_max_elapsed_time(None) // We handle max attempts separately
            .build()
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn derived_from_fixed_options() {
        let config = Config::default();

        assert_eq!(config.connect_timeout, Duration::from_secs(20));
        assert!(config.reconnect.enabled, "reconnection should be enabled");
        assert_eq!(config.reconnect.max_attempts, Some(5));
        assert_eq!(config.reconnect.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(25));
    }

    #[test]
    fn options_override_keeps_heartbeat() {
        let mut base = Config::default();
        base.heartbeat_interval = Duration::from_millis(100);

        let options = ConnectOptions {
            reconnection: false,
            reconnection_attempts: 1,
            reconnection_delay: Duration::from_secs(10),
            timeout: Duration::from_millis(300),
        };
        let config = base.with_options(&options);

        assert_eq!(config.heartbeat_interval, Duration::from_millis(100));
        assert_eq!(config.connect_timeout, Duration::from_millis(300));
        assert!(!config.reconnect.enabled, "reconnection should be disabled");
        assert_eq!(config.reconnect.max_attempts, Some(1));
        assert_eq!(config.reconnect.max_backoff, Duration::from_secs(10));
    }

    #[test]
    fn builder_defaults_match_default() {
        let built = Config::builder().build();
        let default = Config::default();

        assert_eq!(built.heartbeat_interval, default.heartbeat_interval);
        assert_eq!(built.heartbeat_timeout, default.heartbeat_timeout);
        assert_eq!(built.connect_timeout, default.connect_timeout);
        assert_eq!(built.reconnect.enabled, default.reconnect.enabled);
        assert_eq!(built.reconnect.max_attempts, default.reconnect.max_attempts);
        assert_eq!(built.reconnect.initial_backoff, default.reconnect.initial_backoff);
        assert_eq!(built.reconnect.max_backoff, default.reconnect.max_backoff);
    }

    #[test]
    fn reconnect_builder_without_limit() {
        let config = ReconnectConfig::builder().enabled(false).build();

        assert!(!config.enabled, "reconnection should be disabled");
        assert_eq!(config.max_attempts, None);
        assert_eq!(config.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut backoff: ExponentialBackoff = config.into();

        // First backoff should be around initial_backoff (with some jitter)
        let first = backoff.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(1500));
    }

    #[test]
    fn backoff_respects_max() {
        let config = ReconnectConfig {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 3.0,
            ..ReconnectConfig::default()
        };
        let mut backoff: ExponentialBackoff = config.into();

        // Exhaust several iterations
        for _ in 0..10 {
            let _next = backoff.next_backoff();
        }

        // Should still return values capped at max plus jitter
        let duration = backoff.next_backoff().unwrap();
        assert!(duration <= Duration::from_secs(3));
    }
}
