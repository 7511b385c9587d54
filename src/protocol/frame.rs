//! Outbound command frame.
//!
//! A frame is split in two parts so that `ENCRYPT_SEQUENCE` can send its
//! header and its payload as separate writes. For every other command the
//! payload is either empty or written right after the head.
//!
//! # Example
//!
//! ```
//! use vmpc_link::protocol::{opcodes, Frame};
//!
//! let frame = Frame::command(opcodes::INIT_ENCRYPTION);
//! assert_eq!(frame.to_vec(), vec![0x05, 0x00]);
//! assert_eq!(frame.opcode(), opcodes::INIT_ENCRYPTION);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::opcodes;

/// A complete command frame ready to be written.
///
/// The head always starts with the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    head: Bytes,
    payload: Bytes,
}

impl Frame {
    /// Create a frame from the opcode, its fixed-size arguments and payload.
    pub fn new(opcode: u8, args: &[u8], payload: Bytes) -> Self {
        let mut head = BytesMut::with_capacity(1 + args.len());
        head.put_u8(opcode);
        head.extend_from_slice(args);
        Self {
            head: head.freeze(),
            payload,
        }
    }

    /// Argument-less command: opcode followed by the dummy filler byte.
    pub fn command(opcode: u8) -> Self {
        Self::new(opcode, &[opcodes::DUMMY], Bytes::new())
    }

    /// Opcode of this frame.
    #[inline]
    pub fn opcode(&self) -> u8 {
        self.head[0]
    }

    /// Opcode plus fixed-size arguments.
    #[inline]
    pub fn head(&self) -> &Bytes {
        &self.head
    }

    /// Variable-size payload (may be empty).
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Total size on the wire.
    #[inline]
    pub fn len(&self) -> usize {
        self.head.len() + self.payload.len()
    }

    /// Always false: frames carry at least an opcode.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a single buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.head);
        out.extend_from_slice(&self.payload);
        out
    }
}
