//! Feature bitmap reported by the device during the handshake.
//!
//! 32 bytes, one bit per opcode, MSB-first within each byte:
//! ```text
//! opcode c  →  byte c / 8,  mask 0x80 >> (c % 8)
//! ```

use crate::error::{DeviceError, Result};

/// Size of the feature bitmap in bytes (256 opcodes).
pub const FEATURE_BITMAP_SIZE: usize = 32;

/// Which opcodes the connected device implements.
///
/// Defaults to "nothing supported" until a handshake fills it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityMap {
    bits: [u8; FEATURE_BITMAP_SIZE],
}

impl CapabilityMap {
    /// Create a map from the raw bitmap.
    pub fn new(bits: [u8; FEATURE_BITMAP_SIZE]) -> Self {
        Self { bits }
    }

    /// Create a map from a received handshake buffer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `buf` is exactly 32 bytes.
    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        let bits: [u8; FEATURE_BITMAP_SIZE] = buf.try_into().map_err(|_| {
            DeviceError::InvalidArgument(format!(
                "Feature bitmap must be {} bytes, got {}",
                FEATURE_BITMAP_SIZE,
                buf.len()
            ))
        })?;
        Ok(Self { bits })
    }

    /// Build a map with exactly the given opcodes set.
    ///
    /// # Example
    ///
    /// ```
    /// use vmpc_link::protocol::{opcodes, CapabilityMap};
    ///
    /// let caps = CapabilityMap::from_opcodes([opcodes::SET_PASSWORD, 0xFF]);
    /// assert!(caps.is_supported(opcodes::SET_PASSWORD));
    /// assert!(caps.is_supported(0xFF));
    /// assert!(!caps.is_supported(opcodes::DUMP_DATA));
    /// ```
    pub fn from_opcodes<I: IntoIterator<Item = u8>>(opcodes: I) -> Self {
        let mut bits = [0u8; FEATURE_BITMAP_SIZE];
        for opcode in opcodes {
            let (offset, mask) = bit_position(opcode);
            bits[offset] |= mask;
        }
        Self { bits }
    }

    /// Check if the device implements `opcode`.
    #[inline]
    pub fn is_supported(&self, opcode: u8) -> bool {
        let (offset, mask) = bit_position(opcode);
        self.bits[offset] & mask != 0
    }

    /// All supported opcodes in ascending order.
    pub fn supported_opcodes(&self) -> Vec<u8> {
        (0..=u8::MAX).filter(|&op| self.is_supported(op)).collect()
    }

    /// Raw bitmap bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; FEATURE_BITMAP_SIZE] {
        &self.bits
    }
}

#[inline]
fn bit_position(opcode: u8) -> (usize, u8) {
    ((opcode / 8) as usize, 0x80 >> (opcode % 8))
}
