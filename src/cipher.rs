//! Cipher commands: password, (re)initialization, sequence transform,
//! checksum, and state dump/load.
//!
//! The device uses one opcode for both directions. Encrypting and decrypting
//! differ only in the input, so a round trip is:
//!
//! ```ignore
//! device.set_password(b"test").await?;
//! device.initialize_cipher().await?;
//! let ciphertext = device.encrypt_sequence(b"test").await?;
//! device.initialize_cipher().await?; // reset keystream position
//! let plaintext = device.encrypt_sequence(&ciphertext).await?;
//! ```

use bytes::Bytes;

use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::{decode_checksum, opcodes, CipherState, EncryptionChecksum, Request};

impl Connection {
    /// Send the `DUMMY` command (no response).
    pub async fn send_dummy(&mut self) -> Result<()> {
        self.execute(Request::Dummy).await?;
        Ok(())
    }

    /// Set the in-device password, up to 255 bytes.
    pub async fn set_password(&mut self, key: &[u8]) -> Result<()> {
        self.execute(Request::SetPassword(key)).await?;
        Ok(())
    }

    /// Set the password from text.
    ///
    /// The text is sent as ASCII: every non-ASCII character becomes `?`.
    /// Use [`set_password`](Self::set_password) to send other encodings.
    pub async fn set_password_text(&mut self, password: &str) -> Result<()> {
        self.set_password(&ascii_bytes(password)).await
    }

    /// Initialize the cipher with the current password.
    ///
    /// Resets the keystream position; call it before every independent
    /// encrypt or decrypt pass.
    pub async fn initialize_cipher(&mut self) -> Result<()> {
        self.execute(Request::InitEncryption).await?;
        Ok(())
    }

    /// Transform `data` (encrypt or decrypt), at most 16384 bytes.
    ///
    /// Returns exactly `data.len()` bytes.
    pub async fn encrypt_sequence(&mut self, data: &[u8]) -> Result<Bytes> {
        self.execute(Request::EncryptSequence(data)).await
    }

    /// Transform `text`, sent as ASCII like
    /// [`set_password_text`](Self::set_password_text).
    pub async fn encrypt_text(&mut self, text: &str) -> Result<Bytes> {
        self.encrypt_sequence(&ascii_bytes(text)).await
    }

    /// Read the device's input/output checksums.
    pub async fn checksum(&mut self) -> Result<EncryptionChecksum> {
        let response = self.execute(Request::GetChecksum).await?;
        decode_checksum(&response)
    }

    /// Dump the 258-byte cipher state.
    pub async fn dump_state(&mut self) -> Result<CipherState> {
        let response = self.execute(Request::DumpData).await?;
        CipherState::from_bytes(response)
    }

    /// Load a previously dumped cipher state.
    pub async fn load_state(&mut self, state: &CipherState) -> Result<()> {
        self.execute(Request::LoadData(state)).await?;
        Ok(())
    }

    /// Load a cipher state from raw bytes (must be exactly 258).
    pub async fn load_state_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.require(opcodes::LOAD_DATA)?;
        let state = CipherState::from_slice(data)?;
        self.load_state(&state).await
    }

    /// Load a cipher state from the permutation table and index bytes.
    pub async fn load_state_parts(&mut self, table: &[u8], s: u8, n: u8) -> Result<()> {
        self.require(opcodes::LOAD_DATA)?;
        let state = CipherState::from_parts(table, s, n)?;
        self.load_state(&state).await
    }
}

/// ASCII bytes of `text`, one `?` per non-ASCII character.
fn ascii_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}
