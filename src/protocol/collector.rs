//! Response collector for reassembling fixed-length replies.
//!
//! The serial link does not preserve write boundaries: a 258-byte dump may
//! arrive as one chunk or as 258 single bytes. The collector appends chunks
//! in arrival order until the expected length is reached.
//!
//! # Example
//!
//! ```
//! use vmpc_link::protocol::ResponseCollector;
//!
//! let mut collector = ResponseCollector::new(4);
//! collector.push(b"te");
//! assert!(!collector.is_complete());
//! collector.push(b"st");
//! assert!(collector.is_complete());
//! assert_eq!(&collector.into_bytes()[..], b"test");
//! ```

use bytes::{Bytes, BytesMut};

/// Single-use accumulator for one pending response.
#[derive(Debug)]
pub struct ResponseCollector {
    /// Bytes received so far (offset == `buffer.len()`).
    buffer: BytesMut,
    /// Expected response length.
    expected: usize,
}

impl ResponseCollector {
    /// Create a collector waiting for exactly `expected` bytes.
    pub fn new(expected: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(expected),
            expected,
        }
    }

    /// Append a chunk.
    ///
    /// Returns the number of bytes that did not fit (surplus beyond the
    /// expected length). Surplus bytes are not stored.
    pub fn push(&mut self, chunk: &[u8]) -> usize {
        let take = chunk.len().min(self.remaining());
        self.buffer.extend_from_slice(&chunk[..take]);
        chunk.len() - take
    }

    /// Whether the expected length has been reached.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.buffer.len() >= self.expected
    }

    /// Current write offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Expected response length.
    #[inline]
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Bytes still missing.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.expected - self.buffer.len()
    }

    /// Freeze the collected bytes (zero-copy).
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}
