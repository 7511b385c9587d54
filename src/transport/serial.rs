//! Serial port transport.
//!
//! Opens the device port with the fixed framing the firmware expects:
//! 8 data bits, no parity, 1 stop bit, no flow control. Only the baud rate
//! is configurable.
//!
//! # Example
//!
//! ```ignore
//! use vmpc_link::transport::open_serial;
//! use vmpc_link::ConnectionConfig;
//!
//! let port = open_serial("/dev/ttyACM0", &ConnectionConfig::default())?;
//! ```

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::config::ConnectionConfig;
use crate::error::{DeviceError, Result};

/// Open `port` with 8N1 framing at the configured baud rate.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns `DeviceUnavailable` if the port does not exist or cannot be
/// opened (permissions, already in use).
pub fn open_serial(port: &str, config: &ConnectionConfig) -> Result<SerialStream> {
    tokio_serial::new(port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|source| DeviceError::DeviceUnavailable {
            port: port.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_port_is_device_unavailable() {
        let result = open_serial("/dev/vmpc-link-does-not-exist", &ConnectionConfig::default());
        match result {
            Err(DeviceError::DeviceUnavailable { port, .. }) => {
                assert_eq!(port, "/dev/vmpc-link-does-not-exist");
            }
            other => panic!("expected DeviceUnavailable, got {:?}", other.map(|_| ())),
        }
    }
}
