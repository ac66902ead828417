//! Client configuration.

use std::time::Duration;

/// Environment variable that overrides the server endpoint.
pub const SERVER_URL_ENV: &str = "SOMO_SERVER_URL";

/// Server endpoint used when [`SERVER_URL_ENV`] is not set.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000/ws";

/// Default ceiling for automatic reconnection attempts.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before the first reconnection attempt.
const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default deadline for opening a connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default lifetime of a notification.
const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_millis(5000);

/// Configuration for a [`GameSession`](crate::GameSession) and its
/// [`ConnectionManager`](crate::ConnectionManager).
///
/// # Example
///
/// ```
/// use somo_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("ws://play.example:8000/ws")
///     .with_max_reconnect_attempts(3)
///     .with_reconnect_base_delay(Duration::from_millis(250));
/// assert_eq!(config.max_reconnect_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the game server.
    pub url: String,
    /// How many automatic reconnects are attempted after abnormal closes
    /// before giving up. Defaults to **5**.
    pub max_reconnect_attempts: u32,
    /// Delay before the first automatic reconnect; attempt `n` waits
    /// `base * 2^(n-1)`. Defaults to **1000 ms**.
    pub reconnect_base_delay: Duration,
    /// Deadline for a single connection attempt. Defaults to **10 s**.
    pub connect_timeout: Duration,
    /// Lifetime of a notification when none is given explicitly.
    /// Defaults to **5000 ms**.
    pub notification_ttl: Duration,
}

impl ClientConfig {
    /// Create a configuration for `url` with default values.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }

    /// Read the endpoint from `SOMO_SERVER_URL`, falling back to
    /// [`DEFAULT_SERVER_URL`].
    pub fn from_env() -> Self {
        let url = std::env::var(SERVER_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        Self::new(url)
    }

    /// Set the reconnection attempt ceiling.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the base backoff delay.
    #[must_use]
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Set the connection attempt deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default notification lifetime.
    #[must_use]
    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.reconnect_base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}
