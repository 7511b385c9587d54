//! Chunked frame writer for the transport's write half.
//!
//! The device side uses small USB/serial buffers, so every logical write is
//! split into pieces of at most `chunk_size` bytes (128 by default) and
//! flushed once at the end.
//!
//! ```text
//! Frame { head, payload } ─► [≤128] [≤128] ... [≤128] ─► flush ─► Port
//! ```

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::protocol::Frame;

/// Owns the write half of the transport.
pub(crate) struct FrameWriter {
    inner: Box<dyn AsyncWrite + Send + Unpin>,
    chunk_size: usize,
}

impl FrameWriter {
    /// Wrap a writer. `chunk_size` must be non-zero.
    pub(crate) fn new<W>(writer: W, chunk_size: usize) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        debug_assert!(chunk_size > 0);
        Self {
            inner: Box::new(writer),
            chunk_size,
        }
    }

    /// Write head then payload, then flush.
    pub(crate) async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_chunked(frame.head()).await?;
        if !frame.payload().is_empty() {
            self.write_chunked(frame.payload()).await?;
        }
        self.inner.flush().await?;
        Ok(())
    }

    /// Write raw bytes (stream mode passthrough), then flush.
    pub(crate) async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.write_chunked(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn write_chunked(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(self.chunk_size) {
            self.inner.write_all(chunk).await?;
        }
        Ok(())
    }

    /// Shut down the write half.
    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::AsyncReadExt;

    /// Records the size of every poll_write call.
    #[derive(Clone, Default)]
    struct RecordingWriter {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl AsyncWrite for RecordingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.writes.lock().unwrap().push(buf.to_vec());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_frame_head_then_payload() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut writer = FrameWriter::new(client, 128);

        let frame = Frame::new(0x07, &[0x00, 0x04], Bytes::from_static(b"test"));
        writer.write_frame(&frame).await.unwrap();

        let mut buf = vec![0u8; 7];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, vec![0x07, 0x00, 0x04, b't', b'e', b's', b't']);
    }

    #[tokio::test]
    async fn test_chunks_never_exceed_limit() {
        let recorder = RecordingWriter::default();
        let writes = recorder.writes.clone();
        let mut writer = FrameWriter::new(recorder, 128);

        let payload = Bytes::from(vec![0xAB; 300]);
        writer
            .write_frame(&Frame::new(0x07, &[0x01, 0x2C], payload))
            .await
            .unwrap();

        let writes = writes.lock().unwrap();
        let sizes: Vec<usize> = writes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 128, 128, 44]);
    }

    #[tokio::test]
    async fn test_write_raw() {
        let recorder = RecordingWriter::default();
        let writes = recorder.writes.clone();
        let mut writer = FrameWriter::new(recorder, 2);

        writer.write_raw(b"abcde").await.unwrap();

        let flat: Vec<u8> = writes.lock().unwrap().concat();
        assert_eq!(flat, b"abcde");
        assert_eq!(writes.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_signals_eof() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut writer = FrameWriter::new(client, 128);
        writer.shutdown().await.unwrap();

        let mut buf = Vec::new();
        let n = server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
