//! Error types for vmpc-link.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Operation attempted while the session is not `Ready`.
    #[error("Not connected to a device")]
    NotConnected,

    /// The device did not advertise this opcode in its feature bitmap.
    #[error("Command 0x{0:02X} is not supported by this device")]
    UnsupportedOperation(u8),

    /// Payload violates a protocol size bound.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The device did not deliver its full feature bitmap in time.
    #[error("Device did not answer the feature handshake within {0:?}")]
    HandshakeTimeout(Duration),

    /// The serial port could not be opened.
    #[error("Device unavailable on {port}: {source}")]
    DeviceUnavailable {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Stream data sent before `begin_stream` succeeded.
    #[error("Stream encryption not initialized, call begin_stream first")]
    StreamingNotInitialized,

    /// Request/response command issued while the device is in streaming mode.
    #[error("Stream encryption is active, only stream data may be sent")]
    StreamingActive,

    /// Response did not complete within the configured response timeout.
    #[error("Device did not respond within {0:?}")]
    ResponseTimeout(Duration),

    /// Transport closed while a response was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection config could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias using DeviceError.
pub type Result<T> = std::result::Result<T, DeviceError>;
