//! # vmpc-link
//!
//! Host-side driver for a VMPC stream-cipher accelerator attached over a
//! serial port.
//!
//! The device speaks a small binary command protocol: one opcode byte,
//! fixed arguments (16-bit fields Big Endian), optional payload. This crate
//! encodes those commands, reassembles the chunked replies, and exposes each
//! command as an async method on [`Connection`].
//!
//! ## Architecture
//!
//! - **Handshake**: `GET_FEATURES` right after opening; the 32-byte bitmap
//!   decides which commands may be sent
//! - **Request/response**: one outstanding command per connection; replies
//!   are collected to their known length
//! - **Streaming**: after `BEGIN_STREAM` every inbound chunk goes to a sink
//!
//! ## Example
//!
//! ```ignore
//! use vmpc_link::Connection;
//!
//! #[tokio::main]
//! async fn main() -> vmpc_link::Result<()> {
//!     let mut device = Connection::builder().connect("/dev/ttyACM0").await?;
//!
//!     device.set_password_text("test").await?;
//!     device.initialize_cipher().await?;
//!     let ciphertext = device.encrypt_text("test").await?;
//!
//!     let state = device.dump_state().await?;
//!     device.load_state(&state).await?;
//!
//!     device.disconnect().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

mod cipher;
mod connection;
mod device_config;
mod listener;
mod stream;
mod writer;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionBuilder, SessionState};
pub use error::{DeviceError, Result};
pub use protocol::{CipherState, ConfigId, EncryptionChecksum};
pub use stream::StreamSink;
