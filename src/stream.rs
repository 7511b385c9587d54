//! Stream encryption mode.
//!
//! After `BEGIN_STREAM` the device treats every subsequent byte as data to
//! transform and sends the result back at its own pace. There is no
//! end-of-stream frame: the mode lasts until the connection is closed.
//!
//! ```text
//! send_stream_data ──► device ──► reader task ──► StreamSink::on_chunk
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut output = device.begin_stream_channel().await?;
//! device.send_stream_data(b"plaintext").await?;
//! while let Some(chunk) = output.recv().await {
//!     println!("{} bytes", chunk.len());
//! }
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::connection::Connection;
use crate::error::{DeviceError, Result};
use crate::protocol::{opcodes, Request};

/// Receives every inbound chunk while stream encryption is active.
///
/// Called from the reader task, in arrival order. Implementations must not
/// block.
pub trait StreamSink: Send + 'static {
    fn on_chunk(&mut self, chunk: Bytes);
}

impl<F> StreamSink for F
where
    F: FnMut(Bytes) + Send + 'static,
{
    fn on_chunk(&mut self, chunk: Bytes) {
        self(chunk)
    }
}

impl StreamSink for mpsc::UnboundedSender<Bytes> {
    fn on_chunk(&mut self, chunk: Bytes) {
        if self.send(chunk).is_err() {
            tracing::trace!("Stream receiver dropped, discarding chunk");
        }
    }
}

impl Connection {
    /// Switch the device into stream encryption mode.
    ///
    /// `sink` receives every inbound chunk for the rest of the connection.
    /// Request/response commands are unavailable afterwards; only
    /// [`send_stream_data`](Self::send_stream_data) and `disconnect` remain.
    pub async fn begin_stream<S: StreamSink>(&mut self, sink: S) -> Result<()> {
        self.require(opcodes::BEGIN_STREAM)?;
        let frame = Request::BeginStream.encode()?;

        let link = self.link_mut()?;
        link.slot.attach_stream(Box::new(sink))?;
        if let Err(e) = link.writer.write_frame(&frame).await {
            link.slot.detach_stream();
            return Err(e);
        }

        self.set_streaming(true);
        tracing::info!("Stream encryption started");
        Ok(())
    }

    /// Like [`begin_stream`](Self::begin_stream), delivering chunks on an
    /// unbounded channel.
    pub async fn begin_stream_channel(&mut self) -> Result<mpsc::UnboundedReceiver<Bytes>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.begin_stream(tx).await?;
        Ok(rx)
    }

    /// Send raw bytes to be stream-encrypted.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the session is not ready
    /// - `StreamingNotInitialized` before a successful `begin_stream`
    pub async fn send_stream_data(&mut self, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected);
        }
        if !self.is_streaming() {
            return Err(DeviceError::StreamingNotInitialized);
        }

        tracing::trace!("Sending {} stream bytes", data.len());
        self.link_mut()?.writer.write_raw(data).await
    }
}
