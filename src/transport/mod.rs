//! Transport module - the byte link to the device.
//!
//! Provides:
//! - Serial port opening with fixed 8N1 framing (`tokio-serial`)
//! - The [`Transport`] bound accepted by `Connection::connect_stream`

mod serial;

pub use serial::open_serial;

use tokio::io::{AsyncRead, AsyncWrite};

/// Any ordered, reliable byte stream that can carry the device protocol.
///
/// Implemented for every `AsyncRead + AsyncWrite` type, so a serial port,
/// a TCP bridge, or an in-memory `tokio::io::duplex` pipe all qualify.
pub trait Transport: AsyncRead + AsyncWrite + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + 'static {}
