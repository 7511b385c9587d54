//! Opcode table and config identifiers understood by the device.

use crate::error::{DeviceError, Result};

/// Dummy command, also used as the filler byte after argument-less commands.
pub const DUMMY: u8 = 0x00;
/// Set the in-device password (private key).
pub const SET_PASSWORD: u8 = 0x04;
/// Initialize (or reinitialize) the cipher with the current password.
pub const INIT_ENCRYPTION: u8 = 0x05;
/// Switch the device into stream encryption mode.
pub const BEGIN_STREAM: u8 = 0x06;
/// Encrypt (or decrypt) a length-prefixed sequence.
pub const ENCRYPT_SEQUENCE: u8 = 0x07;
/// Read input/output checksums of the last encryption.
pub const GET_CHECKSUM: u8 = 0x10;
/// Dump the 258-byte cipher state.
pub const DUMP_DATA: u8 = 0x50;
/// Load a 258-byte cipher state.
pub const LOAD_DATA: u8 = 0x51;
/// Fetch the 32-byte feature bitmap.
pub const GET_FEATURES: u8 = 0xF0;
/// Read a config value.
pub const GET_CONFIG_VALUE: u8 = 0xF1;
/// Write a config value.
pub const SET_CONFIG_VALUE: u8 = 0xF2;

/// Human-readable opcode name for logs.
pub fn name(opcode: u8) -> &'static str {
    match opcode {
        DUMMY => "DUMMY",
        SET_PASSWORD => "SET_PASSWORD",
        INIT_ENCRYPTION => "INIT_ENCRYPTION",
        BEGIN_STREAM => "BEGIN_STREAM",
        ENCRYPT_SEQUENCE => "ENCRYPT_SEQUENCE",
        GET_CHECKSUM => "GET_CHECKSUM",
        DUMP_DATA => "DUMP_DATA",
        LOAD_DATA => "LOAD_DATA",
        GET_FEATURES => "GET_FEATURES",
        GET_CONFIG_VALUE => "GET_CONFIG_VALUE",
        SET_CONFIG_VALUE => "SET_CONFIG_VALUE",
        _ => "UNKNOWN",
    }
}

/// Device configuration identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConfigId {
    /// Chunk size the device uses while stream encrypting.
    StreamChunkSize = 0x0,
    /// Fast USB mode: the device reports idle immediately instead of
    /// waiting for processing to end.
    FastUsbMode = 0x1,
}

impl ConfigId {
    /// Wire byte for this identifier.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ConfigId {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x0 => Ok(ConfigId::StreamChunkSize),
            0x1 => Ok(ConfigId::FastUsbMode),
            other => Err(DeviceError::InvalidArgument(format!(
                "Unknown config identifier 0x{:02X}",
                other
            ))),
        }
    }
}
