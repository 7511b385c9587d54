//! Connection configuration.
//!
//! All fields have defaults matching the reference firmware, so an empty
//! JSON object is a valid config:
//!
//! ```
//! use vmpc_link::ConnectionConfig;
//!
//! let config = ConnectionConfig::from_json(r#"{ "baud_rate": 57600 }"#).unwrap();
//! assert_eq!(config.baud_rate, 57600);
//! assert_eq!(config.read_buffer_size, 128);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default time allowed for the device to return its feature bitmap.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default read/write chunk size.
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Settings applied when a connection is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Handshake (`GET_FEATURES`) timeout in milliseconds.
    pub handshake_timeout_ms: u64,
    /// Per-response timeout in milliseconds. `None` waits indefinitely.
    pub response_timeout_ms: Option<u64>,
    /// Maximum bytes per transport read.
    pub read_buffer_size: usize,
    /// Maximum bytes per transport write.
    pub write_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64,
            response_timeout_ms: None,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Handshake timeout as a `Duration`.
    #[inline]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Response timeout as a `Duration`, if any.
    #[inline]
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values the transport cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(DeviceError::InvalidArgument(
                "Baud rate must be non-zero".to_string(),
            ));
        }
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(DeviceError::InvalidArgument(
                "Read and write buffer sizes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
