//! Interactive smoke test against a real device.
//!
//! ```text
//! cargo run --example tester -- /dev/ttyACM0 [config.json]
//! ```
//!
//! Set `RUST_LOG=vmpc_link=debug` to see every frame.

use vmpc_link::protocol::opcodes;
use vmpc_link::{Connection, ConnectionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().ok_or("usage: tester <port> [config.json]")?;
    let config = match args.next() {
        Some(path) => ConnectionConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ConnectionConfig::default(),
    };

    let mut device = Connection::builder().config(config).connect(&port).await?;

    println!("Supported commands:");
    for op in device.supported_opcodes() {
        println!("  0x{:02X} {}", op, opcodes::name(op));
    }

    if device.is_supported(opcodes::GET_CONFIG_VALUE) {
        println!("Stream chunk size: {}", device.stream_chunk_size().await?);
        println!("Fast USB mode: {}", device.fast_usb_mode().await?);
    }

    device.set_password_text("test").await?;
    device.initialize_cipher().await?;
    let ciphertext = device.encrypt_text("test").await?;
    println!("Encrypted: {:02X?}", &ciphertext[..]);

    device.initialize_cipher().await?;
    let plaintext = device.encrypt_sequence(&ciphertext).await?;
    println!("Decrypted: {}", String::from_utf8_lossy(&plaintext));

    if device.is_supported(opcodes::DUMP_DATA) {
        let state = device.dump_state().await?;
        println!("State: s=0x{:02X} n=0x{:02X}", state.s(), state.n());
        if device.is_supported(opcodes::LOAD_DATA) {
            device.load_state(&state).await?;
        }
    }

    if device.is_supported(opcodes::GET_CHECKSUM) {
        let checksum = device.checksum().await?;
        println!("Checksum: in={} out={}", checksum.input, checksum.output);
    }

    device.disconnect().await?;
    Ok(())
}
