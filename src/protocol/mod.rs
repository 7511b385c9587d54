//! Protocol module - opcode table, framing, and response reassembly.
//!
//! This module implements the device command protocol:
//! - Opcode constants and config identifiers
//! - Request encoding (Big Endian 16-bit fields)
//! - Feature bitmap (capability) lookup
//! - Response collector for chunked replies
//! - Opaque cipher state blob

mod capability;
mod collector;
mod frame;
pub mod opcodes;
mod state_blob;
mod wire_format;

pub use capability::{CapabilityMap, FEATURE_BITMAP_SIZE};
pub use collector::ResponseCollector;
pub use frame::Frame;
pub use opcodes::ConfigId;
pub use state_blob::{CipherState, PERMUTATION_TABLE_SIZE, STATE_BLOB_SIZE};
pub use wire_format::{
    decode_checksum, decode_u16, encode_u16, EncryptionChecksum, Request, CHECKSUM_RESPONSE_SIZE,
    CONFIG_VALUE_SIZE, MAX_PASSWORD_LEN, MAX_SEQUENCE_LEN,
};
