//! Serialized cipher state exchanged by `DUMP_DATA` / `LOAD_DATA`.
//!
//! ```text
//! ┌───────────────────────┬─────┬─────┐
//! │ P (permutation table) │  s  │  n  │
//! │ 256 bytes             │ 1 B │ 1 B │
//! └───────────────────────┴─────┴─────┘
//! ```
//!
//! The contents are opaque to the driver; only the length is checked.

use bytes::Bytes;

use crate::error::{DeviceError, Result};

/// Size of the serialized cipher state.
pub const STATE_BLOB_SIZE: usize = 258;

/// Size of the permutation table inside the state.
pub const PERMUTATION_TABLE_SIZE: usize = 256;

/// Opaque 258-byte cipher state.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherState {
    bytes: Bytes,
}

impl CipherState {
    /// Wrap a dumped or stored state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `data` is exactly 258 bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    /// Wrap a state held in `Bytes` (zero-copy).
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        if bytes.len() != STATE_BLOB_SIZE {
            return Err(DeviceError::InvalidArgument(format!(
                "State length must equal {} bytes, got {}",
                STATE_BLOB_SIZE,
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Assemble a state from the permutation table and both index bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use vmpc_link::protocol::CipherState;
    ///
    /// let table: Vec<u8> = (0..=255).collect();
    /// let state = CipherState::from_parts(&table, 7, 9).unwrap();
    /// assert_eq!(state.s(), 7);
    /// assert_eq!(state.n(), 9);
    /// assert_eq!(state.as_bytes().len(), 258);
    /// ```
    pub fn from_parts(table: &[u8], s: u8, n: u8) -> Result<Self> {
        if table.len() != PERMUTATION_TABLE_SIZE {
            return Err(DeviceError::InvalidArgument(format!(
                "P table length must equal {} bytes, got {}",
                PERMUTATION_TABLE_SIZE,
                table.len()
            )));
        }
        let mut buf = Vec::with_capacity(STATE_BLOB_SIZE);
        buf.extend_from_slice(table);
        buf.push(s);
        buf.push(n);
        Ok(Self {
            bytes: Bytes::from(buf),
        })
    }

    /// Permutation table.
    #[inline]
    pub fn table(&self) -> &[u8] {
        &self.bytes[..PERMUTATION_TABLE_SIZE]
    }

    /// First index byte.
    #[inline]
    pub fn s(&self) -> u8 {
        self.bytes[PERMUTATION_TABLE_SIZE]
    }

    /// Second index byte.
    #[inline]
    pub fn n(&self) -> u8 {
        self.bytes[PERMUTATION_TABLE_SIZE + 1]
    }

    /// All 258 bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the underlying buffer.
    #[inline]
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

impl std::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Table contents are key material; keep them out of logs.
        f.debug_struct("CipherState")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
