//! Link configuration.

use std::time::Duration;

use asm_protocol::{DEFAULT_PORT, FRAME_BUFFER_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

/// Host used when nothing else is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Configuration for a [`LinkSession`](crate::LinkSession).
///
/// Every field has a default, so a partial YAML document is enough:
///
/// ```yaml
/// host: 192.168.4.1
/// reconnect_interval_ms: 2000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Sensor module host name or address.
    pub host: String,

    /// Sensor module TCP port.
    pub port: u16,

    /// Spacing between automatic reconnect attempts (milliseconds).
    pub reconnect_interval_ms: u64,

    /// Failed automatic retries tolerated before the link gives up.
    pub max_reconnect_attempts: u32,

    /// Size of a single socket read (bytes).
    pub read_buffer_size: usize,

    /// Upper bound on a single connect attempt (milliseconds).
    /// Reads have no deadline.
    pub connect_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reconnect_interval_ms: 5_000,
            max_reconnect_attempts: 5,
            read_buffer_size: FRAME_BUFFER_SIZE,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LinkConfig {
    /// Set the remote host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the remote port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the spacing between automatic reconnect attempts.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set how many failed automatic retries are tolerated.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Spacing between automatic reconnect attempts.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Upper bound on a single connect attempt.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> LinkResult<()> {
        if self.host.trim().is_empty() {
            return Err(LinkError::InvalidConfig("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(LinkError::InvalidConfig("port must be non-zero".into()));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(LinkError::InvalidConfig(
                "reconnect interval must be positive".into(),
            ));
        }
        if self.read_buffer_size < 2 {
            return Err(LinkError::InvalidConfig(format!(
                "read buffer of {} bytes cannot hold a record",
                self.read_buffer_size
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(LinkError::InvalidConfig("connect timeout must be positive".into()));
        }
        Ok(())
    }
}
