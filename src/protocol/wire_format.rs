//! Wire format encoding and decoding.
//!
//! Every request starts with a single opcode byte:
//! ```text
//! SET_PASSWORD      │ 0x04 │ len u8    │ key[len]      │
//! ENCRYPT_SEQUENCE  │ 0x07 │ len u16 BE│ data[len]     │
//! LOAD_DATA         │ 0x51 │ state[258]                │
//! GET_CONFIG_VALUE  │ 0xF1 │ id u8     │ 0x00          │
//! SET_CONFIG_VALUE  │ 0xF2 │ id u8     │ value u16 BE  │
//! GET_CHECKSUM      │ 0x10 │
//! others            │ op   │ 0x00 │
//! ```
//!
//! All multi-byte integers are Big Endian, independent of host order.

use bytes::Bytes;

use super::capability::FEATURE_BITMAP_SIZE;
use super::frame::Frame;
use super::opcodes::{self, ConfigId};
use super::state_blob::{CipherState, STATE_BLOB_SIZE};
use crate::error::{DeviceError, Result};

/// Maximum `ENCRYPT_SEQUENCE` payload (protocol revision with 16 KiB buffers).
pub const MAX_SEQUENCE_LEN: usize = 16384;

/// Maximum `SET_PASSWORD` key length.
pub const MAX_PASSWORD_LEN: usize = 255;

/// Size of a `GET_CONFIG_VALUE` response.
pub const CONFIG_VALUE_SIZE: usize = 2;

/// Size of a `GET_CHECKSUM` response.
pub const CHECKSUM_RESPONSE_SIZE: usize = 8;

/// A request understood by the device.
#[derive(Debug, Clone, Copy)]
pub enum Request<'a> {
    Dummy,
    SetPassword(&'a [u8]),
    InitEncryption,
    BeginStream,
    EncryptSequence(&'a [u8]),
    GetChecksum,
    DumpData,
    LoadData(&'a CipherState),
    GetFeatures,
    GetConfigValue(ConfigId),
    SetConfigValue(ConfigId, u16),
}

impl Request<'_> {
    /// Opcode byte for this request.
    pub fn opcode(&self) -> u8 {
        match self {
            Request::Dummy => opcodes::DUMMY,
            Request::SetPassword(_) => opcodes::SET_PASSWORD,
            Request::InitEncryption => opcodes::INIT_ENCRYPTION,
            Request::BeginStream => opcodes::BEGIN_STREAM,
            Request::EncryptSequence(_) => opcodes::ENCRYPT_SEQUENCE,
            Request::GetChecksum => opcodes::GET_CHECKSUM,
            Request::DumpData => opcodes::DUMP_DATA,
            Request::LoadData(_) => opcodes::LOAD_DATA,
            Request::GetFeatures => opcodes::GET_FEATURES,
            Request::GetConfigValue(_) => opcodes::GET_CONFIG_VALUE,
            Request::SetConfigValue(..) => opcodes::SET_CONFIG_VALUE,
        }
    }

    /// Number of response bytes the device sends back synchronously.
    pub fn response_len(&self) -> usize {
        match self {
            Request::EncryptSequence(data) => data.len(),
            Request::GetChecksum => CHECKSUM_RESPONSE_SIZE,
            Request::DumpData => STATE_BLOB_SIZE,
            Request::GetFeatures => FEATURE_BITMAP_SIZE,
            Request::GetConfigValue(_) => CONFIG_VALUE_SIZE,
            _ => 0,
        }
    }

    /// Check payload size bounds.
    pub fn validate(&self) -> Result<()> {
        match self {
            Request::SetPassword(key) if key.len() > MAX_PASSWORD_LEN => {
                Err(DeviceError::InvalidArgument(format!(
                    "Max password length is {} bytes, got {}",
                    MAX_PASSWORD_LEN,
                    key.len()
                )))
            }
            Request::EncryptSequence(data) if data.len() > MAX_SEQUENCE_LEN => {
                Err(DeviceError::InvalidArgument(format!(
                    "Max sequence length is {} bytes, got {}",
                    MAX_SEQUENCE_LEN,
                    data.len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Validate and encode into a wire frame.
    ///
    /// # Example
    ///
    /// ```
    /// use vmpc_link::protocol::Request;
    ///
    /// let frame = Request::EncryptSequence(b"test").encode().unwrap();
    /// assert_eq!(&frame.head()[..], &[0x07, 0x00, 0x04]);
    /// assert_eq!(&frame.payload()[..], b"test");
    /// ```
    pub fn encode(&self) -> Result<Frame> {
        self.validate()?;
        let op = self.opcode();

        let frame = match *self {
            Request::SetPassword(key) => {
                Frame::new(op, &[key.len() as u8], Bytes::copy_from_slice(key))
            }
            Request::EncryptSequence(data) => {
                let [hi, lo] = encode_u16(data.len() as u16);
                Frame::new(op, &[hi, lo], Bytes::copy_from_slice(data))
            }
            Request::LoadData(state) => Frame::new(op, &[], state.to_bytes()),
            Request::GetChecksum => Frame::new(op, &[], Bytes::new()),
            Request::GetConfigValue(id) => {
                Frame::new(op, &[id.as_byte(), opcodes::DUMMY], Bytes::new())
            }
            Request::SetConfigValue(id, value) => {
                let [hi, lo] = encode_u16(value);
                Frame::new(op, &[id.as_byte(), hi, lo], Bytes::new())
            }
            Request::Dummy
            | Request::InitEncryption
            | Request::BeginStream
            | Request::DumpData
            | Request::GetFeatures => Frame::command(op),
        };

        Ok(frame)
    }
}

/// Encode a 16-bit field (Big Endian).
#[inline]
pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Decode a 16-bit field (Big Endian).
pub fn decode_u16(buf: &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = buf.try_into().map_err(|_| {
        DeviceError::InvalidArgument(format!(
            "16-bit field must be 2 bytes, got {}",
            buf.len()
        ))
    })?;
    Ok(u16::from_be_bytes(bytes))
}

/// Input/output checksums reported by `GET_CHECKSUM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionChecksum {
    pub input: u32,
    pub output: u32,
}

/// Decode a `GET_CHECKSUM` response (two u32 BE).
pub fn decode_checksum(buf: &[u8]) -> Result<EncryptionChecksum> {
    if buf.len() != CHECKSUM_RESPONSE_SIZE {
        return Err(DeviceError::InvalidArgument(format!(
            "Checksum response must be {} bytes, got {}",
            CHECKSUM_RESPONSE_SIZE,
            buf.len()
        )));
    }
    Ok(EncryptionChecksum {
        input: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
        output: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u16_big_endian_byte_order() {
        assert_eq!(encode_u16(0x0102), [0x01, 0x02]);
        assert_eq!(encode_u16(16384), [0x40, 0x00]);
        assert_eq!(decode_u16(&[0x01, 0x02]).unwrap(), 0x0102);
        assert!(decode_u16(&[0x01]).is_err());
    }

    #[test]
    fn test_argumentless_commands_carry_filler() {
        for req in [
            Request::Dummy,
            Request::InitEncryption,
            Request::BeginStream,
            Request::DumpData,
            Request::GetFeatures,
        ] {
            let frame = req.encode().unwrap();
            assert_eq!(frame.to_vec(), vec![req.opcode(), 0x00]);
        }
    }

    #[test]
    fn test_set_password_frame() {
        let frame = Request::SetPassword(b"key").encode().unwrap();
        assert_eq!(frame.to_vec(), vec![0x04, 3, b'k', b'e', b'y']);
    }

    #[test]
    fn test_set_password_max_length() {
        let key = vec![b'x'; MAX_PASSWORD_LEN];
        let frame = Request::SetPassword(&key).encode().unwrap();
        assert_eq!(frame.len(), MAX_PASSWORD_LEN + 2);
        assert_eq!(frame.head()[1], 255);

        let key = vec![b'x'; MAX_PASSWORD_LEN + 1];
        let result = Request::SetPassword(&key).encode();
        assert!(matches!(result, Err(DeviceError::InvalidArgument(_))));
    }

    #[test]
    fn test_encrypt_sequence_length_prefix() {
        let data = vec![0u8; 0x1234];
        let frame = Request::EncryptSequence(&data).encode().unwrap();
        assert_eq!(&frame.head()[..], &[0x07, 0x12, 0x34]);
        assert_eq!(frame.payload().len(), 0x1234);
        assert_eq!(Request::EncryptSequence(&data).response_len(), 0x1234);
    }

    #[test]
    fn test_encrypt_sequence_bounds() {
        let max = vec![0u8; MAX_SEQUENCE_LEN];
        assert!(Request::EncryptSequence(&max).encode().is_ok());

        let over = vec![0u8; MAX_SEQUENCE_LEN + 1];
        let result = Request::EncryptSequence(&over).encode();
        assert!(result.unwrap_err().to_string().contains("Max sequence length"));
    }

    #[test]
    fn test_load_data_forms_are_identical() {
        let table: Vec<u8> = (0..=255u8).collect();
        let parts = CipherState::from_parts(&table, 3, 4).unwrap();

        let mut flat = table.clone();
        flat.extend_from_slice(&[3, 4]);
        let whole = CipherState::from_slice(&flat).unwrap();

        let a = Request::LoadData(&parts).encode().unwrap().to_vec();
        let b = Request::LoadData(&whole).encode().unwrap().to_vec();
        assert_eq!(a, b);
        assert_eq!(a.len(), 259);
        assert_eq!(a[0], opcodes::LOAD_DATA);
        assert_eq!(&a[257..], &[3, 4]);
    }

    #[test]
    fn test_config_frames() {
        let get = Request::GetConfigValue(ConfigId::FastUsbMode).encode().unwrap();
        assert_eq!(get.to_vec(), vec![0xF1, 0x01, 0x00]);

        let set = Request::SetConfigValue(ConfigId::StreamChunkSize, 0x0104)
            .encode()
            .unwrap();
        assert_eq!(set.to_vec(), vec![0xF2, 0x00, 0x01, 0x04]);
    }

    #[test]
    fn test_get_checksum_is_bare_opcode() {
        let frame = Request::GetChecksum.encode().unwrap();
        assert_eq!(frame.to_vec(), vec![0x10]);
    }

    #[test]
    fn test_response_lengths() {
        assert_eq!(Request::GetFeatures.response_len(), 32);
        assert_eq!(Request::DumpData.response_len(), 258);
        assert_eq!(Request::GetConfigValue(ConfigId::StreamChunkSize).response_len(), 2);
        assert_eq!(Request::GetChecksum.response_len(), 8);
        assert_eq!(Request::InitEncryption.response_len(), 0);
        assert_eq!(Request::BeginStream.response_len(), 0);
    }

    #[test]
    fn test_decode_checksum() {
        let buf = [0x00, 0x00, 0x01, 0x00, 0xDE, 0xAD, 0xBE, 0xEF];
        let checksum = decode_checksum(&buf).unwrap();
        assert_eq!(checksum.input, 256);
        assert_eq!(checksum.output, 0xDEADBEEF);
        assert!(decode_checksum(&buf[..7]).is_err());
    }
}
