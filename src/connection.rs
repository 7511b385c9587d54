//! Connection builder and session state machine.
//!
//! The [`ConnectionBuilder`] accumulates a [`ConnectionConfig`]. The
//! [`Connection`] manages the lifecycle:
//! 1. Open the transport (serial port or caller-supplied stream)
//! 2. Spawn the reader task feeding the listener slot
//! 3. Handshake: `GET_FEATURES`, wait (bounded) for the 32-byte bitmap
//! 4. Serve request/response operations one at a time
//!
//! ```text
//! Disconnected ─► Connecting ─► Handshaking ─► Ready ─► Disconnected
//!                      │              │
//!                      └──── error ───┴──────────────► Disconnected
//! ```
//!
//! # Example
//!
//! ```ignore
//! use vmpc_link::Connection;
//!
//! #[tokio::main]
//! async fn main() -> vmpc_link::Result<()> {
//!     let mut device = Connection::builder()
//!         .baud_rate(115_200)
//!         .connect("/dev/ttyACM0")
//!         .await?;
//!
//!     device.set_password(b"secret").await?;
//!     device.initialize_cipher().await?;
//!     let ciphertext = device.encrypt_sequence(b"hello").await?;
//!
//!     device.initialize_cipher().await?;
//!     let plaintext = device.encrypt_sequence(&ciphertext).await?;
//!     assert_eq!(&plaintext[..], b"hello");
//!
//!     device.disconnect().await
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::error::{DeviceError, Result};
use crate::listener::{read_loop, ListenerSlot};
use crate::protocol::{opcodes, CapabilityMap, Frame, Request, FEATURE_BITMAP_SIZE};
use crate::transport::{open_serial, Transport};
use crate::writer::FrameWriter;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Handshaking,
    Ready,
}

/// Builder for configuring and opening a [`Connection`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole config (e.g. one loaded from JSON).
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the serial baud rate.
    ///
    /// Default: 115200
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Set how long to wait for the feature bitmap.
    ///
    /// Default: 5 seconds
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout_ms = duration_millis(timeout);
        self
    }

    /// Bound every response wait.
    ///
    /// Default: wait indefinitely
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout_ms = Some(duration_millis(timeout));
        self
    }

    /// Set the maximum bytes per transport read.
    ///
    /// Default: 128
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the maximum bytes per transport write.
    ///
    /// Default: 128
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    /// Build a disconnected connection.
    pub fn build(self) -> Connection {
        Connection::new(self.config)
    }

    /// Build and connect to a serial port.
    pub async fn connect(self, port: &str) -> Result<Connection> {
        let mut connection = self.build();
        connection.connect(port).await?;
        Ok(connection)
    }

    /// Build and connect over an arbitrary byte stream.
    pub async fn connect_stream<S: Transport>(
        self,
        label: impl Into<String>,
        stream: S,
    ) -> Result<Connection> {
        let mut connection = self.build();
        connection.connect_stream(label, stream).await?;
        Ok(connection)
    }
}

/// Milliseconds in `duration`, saturating at `u64::MAX`.
fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Open transport plus the reader task feeding it.
pub(crate) struct Link {
    /// Port name or caller-supplied label.
    port: String,
    pub(crate) writer: FrameWriter,
    pub(crate) slot: Arc<ListenerSlot>,
    reader_task: JoinHandle<()>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.slot.close();
    }
}

/// A session with one hardware cipher device.
///
/// All operations take `&mut self`, so at most one request is ever
/// outstanding on a connection.
pub struct Connection {
    config: ConnectionConfig,
    state: SessionState,
    link: Option<Link>,
    capabilities: CapabilityMap,
    streaming: bool,
}

impl Connection {
    /// Create a disconnected connection with the given config.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            link: None,
            capabilities: CapabilityMap::default(),
            streaming: false,
        }
    }

    /// Create a new connection builder.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Current session state.
    ///
    /// A session whose device went away (transport EOF or read error)
    /// reports `Disconnected`.
    pub fn state(&self) -> SessionState {
        match &self.link {
            Some(link) if link.slot.is_closed() => SessionState::Disconnected,
            _ => self.state,
        }
    }

    /// Whether the session is `Ready`.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Port name (or stream label) of the open transport.
    pub fn port(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.port.as_str())
    }

    /// Active config.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Feature bitmap from the last handshake (empty when disconnected).
    pub fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    /// Check if the connected device supports `opcode`.
    #[inline]
    pub fn is_supported(&self, opcode: u8) -> bool {
        self.capabilities.is_supported(opcode)
    }

    /// All opcodes the connected device supports, ascending.
    pub fn supported_opcodes(&self) -> Vec<u8> {
        self.capabilities.supported_opcodes()
    }

    /// Whether stream encryption is active.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Open `port` and perform the feature handshake.
    ///
    /// An already open connection is closed first.
    ///
    /// # Errors
    ///
    /// - `DeviceUnavailable` if the port cannot be opened
    /// - `HandshakeTimeout` if the device does not answer in time
    pub async fn connect(&mut self, port: &str) -> Result<()> {
        self.prepare_connect().await?;

        tracing::info!("Opening {} at {} baud", port, self.config.baud_rate);
        let stream = match open_serial(port, &self.config) {
            Ok(stream) => stream,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e);
            }
        };

        self.start(port.to_string(), stream).await
    }

    /// Perform the feature handshake over an already open byte stream.
    ///
    /// `label` identifies the link in logs and [`Connection::port`].
    pub async fn connect_stream<S: Transport>(
        &mut self,
        label: impl Into<String>,
        stream: S,
    ) -> Result<()> {
        self.prepare_connect().await?;
        self.start(label.into(), stream).await
    }

    async fn prepare_connect(&mut self) -> Result<()> {
        self.config.validate()?;
        if self.link.is_some() {
            tracing::debug!("Reconnecting, closing previous transport");
            self.teardown().await;
        }
        self.state = SessionState::Connecting;
        Ok(())
    }

    async fn start<S: Transport>(&mut self, port: String, stream: S) -> Result<()> {
        let (reader, writer) = tokio::io::split(stream);
        let slot = ListenerSlot::new();
        let reader_task = tokio::spawn(read_loop(
            reader,
            slot.clone(),
            self.config.read_buffer_size,
        ));

        self.link = Some(Link {
            port,
            writer: FrameWriter::new(writer, self.config.write_buffer_size),
            slot,
            reader_task,
        });
        self.state = SessionState::Handshaking;

        match self.handshake().await {
            Ok(capabilities) => {
                self.capabilities = capabilities;
                self.state = SessionState::Ready;
                tracing::info!(
                    "Connected to {}, {} commands supported",
                    self.port().unwrap_or_default(),
                    capabilities.supported_opcodes().len()
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Handshake failed: {}", e);
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<CapabilityMap> {
        let frame = Request::GetFeatures.encode()?;
        let timeout = self.config.handshake_timeout();

        let bits = match self.exchange(frame, FEATURE_BITMAP_SIZE, Some(timeout)).await {
            Ok(bits) => bits,
            Err(DeviceError::ResponseTimeout(limit)) => {
                return Err(DeviceError::HandshakeTimeout(limit))
            }
            Err(e) => return Err(e),
        };

        CapabilityMap::from_slice(&bits)
    }

    /// Close the transport.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if no transport is open.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.link.is_none() {
            return Err(DeviceError::NotConnected);
        }
        let port = self.port().unwrap_or_default().to_string();
        self.teardown().await;
        tracing::info!("Disconnected from {}", port);
        Ok(())
    }

    async fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.writer.shutdown().await {
                tracing::debug!("Transport shutdown error: {}", e);
            }
        }
        self.capabilities = CapabilityMap::default();
        self.streaming = false;
        self.state = SessionState::Disconnected;
    }

    /// Gate every command: session ready, not streaming, opcode supported.
    pub(crate) fn require(&self, opcode: u8) -> Result<()> {
        if !self.is_connected() || self.link.is_none() {
            return Err(DeviceError::NotConnected);
        }
        if self.streaming {
            return Err(DeviceError::StreamingActive);
        }
        if !self.capabilities.is_supported(opcode) {
            return Err(DeviceError::UnsupportedOperation(opcode));
        }
        Ok(())
    }

    /// Run one request/response exchange.
    ///
    /// Checks run before any byte is written: connection, capability, then
    /// payload bounds.
    pub(crate) async fn execute(&mut self, request: Request<'_>) -> Result<Bytes> {
        self.require(request.opcode())?;
        let frame = request.encode()?;
        let timeout = self.config.response_timeout();
        self.exchange(frame, request.response_len(), timeout).await
    }

    /// Attach a collector, write the frame, wait for `expected` bytes.
    async fn exchange(
        &mut self,
        frame: Frame,
        expected: usize,
        timeout: Option<Duration>,
    ) -> Result<Bytes> {
        let link = self.link.as_mut().ok_or(DeviceError::NotConnected)?;

        tracing::debug!(
            "Sending {} ({} bytes), expecting {} bytes",
            opcodes::name(frame.opcode()),
            frame.len(),
            expected
        );

        if expected == 0 {
            link.writer.write_frame(&frame).await?;
            return Ok(Bytes::new());
        }

        // Attach before writing so no early byte is lost.
        let pending = link.slot.attach(expected)?;
        link.writer.write_frame(&frame).await?;
        let response = pending.wait(timeout).await?;

        tracing::trace!("Received {} response bytes", response.len());
        Ok(response)
    }

    /// Open link, or `NotConnected`.
    pub(crate) fn link_mut(&mut self) -> Result<&mut Link> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected);
        }
        self.link.as_mut().ok_or(DeviceError::NotConnected)
    }

    pub(crate) fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("port", &self.port())
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}
