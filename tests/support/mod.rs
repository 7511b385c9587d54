//! Scripted stand-in for the cipher device, served over `tokio::io::duplex`.
//!
//! The "cipher" is a position-dependent XOR keystream derived from the
//! password, which is enough to exercise the symmetric encrypt/decrypt
//! behaviour of the real hardware.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use vmpc_link::protocol::{opcodes, CapabilityMap, FEATURE_BITMAP_SIZE, STATE_BLOB_SIZE};

/// How the fake device behaves.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Bitmap returned by GET_FEATURES.
    pub features: CapabilityMap,
    /// Reply bytes per write (1 = byte-at-a-time delivery).
    pub reply_chunk: usize,
    /// Answer GET_FEATURES at all.
    pub answer_handshake: bool,
    /// Answer commands after the handshake.
    pub respond: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            features: CapabilityMap::new([0xFF; FEATURE_BITMAP_SIZE]),
            reply_chunk: 1,
            answer_handshake: true,
            respond: true,
        }
    }
}

/// Handle to a running fake device.
pub struct FakeDevice {
    received: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl FakeDevice {
    /// Spawn the device; returns the host end of the link.
    pub fn spawn(options: DeviceOptions) -> (DuplexStream, FakeDevice) {
        let (host, device) = tokio::io::duplex(1024);
        let received = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(run(device, options, received.clone()));
        (host, FakeDevice { received, task })
    }

    /// Every byte the device has read so far.
    pub fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_len(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Simulate the device disappearing.
    pub fn unplug(&self) {
        self.task.abort();
    }

    /// Wait until the device sees the host hang up.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// Keystream byte at `position` for `password`.
pub fn keystream(password: &[u8], position: usize) -> u8 {
    let base = if password.is_empty() {
        0
    } else {
        password[position % password.len()]
    };
    base.wrapping_add(position as u8) ^ 0x5A
}

/// What the device would return for `data` right after INIT_ENCRYPTION.
pub fn expected_transform(password: &[u8], data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ keystream(password, i))
        .collect()
}

struct DeviceState {
    password: Vec<u8>,
    position: usize,
    blob: [u8; STATE_BLOB_SIZE],
    config: [u16; 2],
    streaming: bool,
    input_sum: u32,
    output_sum: u32,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            password: Vec::new(),
            position: 0,
            blob: [0; STATE_BLOB_SIZE],
            config: [64, 0],
            streaming: false,
            input_sum: 0,
            output_sum: 0,
        }
    }

    fn transform(&mut self, data: &[u8]) -> Vec<u8> {
        let out: Vec<u8> = data
            .iter()
            .map(|b| {
                let k = keystream(&self.password, self.position);
                self.position += 1;
                b ^ k
            })
            .collect();
        self.input_sum = data.iter().fold(self.input_sum, |acc, &b| acc + b as u32);
        self.output_sum = out.iter().fold(self.output_sum, |acc, &b| acc + b as u32);
        out
    }

    fn init(&mut self) {
        self.position = 0;
        self.input_sum = 0;
        self.output_sum = 0;
        let key_sum = self.password.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        for (i, slot) in self.blob[..256].iter_mut().enumerate() {
            *slot = (i as u8).wrapping_add(key_sum);
        }
        self.blob[256] = key_sum;
        self.blob[257] = 0;
    }

    fn handle(&mut self, cmd: &[u8]) -> Option<Vec<u8>> {
        match cmd[0] {
            opcodes::SET_PASSWORD => {
                self.password = cmd[2..].to_vec();
                None
            }
            opcodes::INIT_ENCRYPTION => {
                self.init();
                None
            }
            opcodes::BEGIN_STREAM => {
                self.streaming = true;
                None
            }
            opcodes::ENCRYPT_SEQUENCE => Some(self.transform(&cmd[3..])),
            opcodes::GET_CHECKSUM => {
                let mut out = self.input_sum.to_be_bytes().to_vec();
                out.extend_from_slice(&self.output_sum.to_be_bytes());
                Some(out)
            }
            opcodes::DUMP_DATA => Some(self.blob.to_vec()),
            opcodes::LOAD_DATA => {
                self.blob.copy_from_slice(&cmd[1..]);
                None
            }
            opcodes::GET_CONFIG_VALUE => {
                Some(self.config[cmd[1] as usize].to_be_bytes().to_vec())
            }
            opcodes::SET_CONFIG_VALUE => {
                self.config[cmd[1] as usize] = u16::from_be_bytes([cmd[2], cmd[3]]);
                None
            }
            _ => None,
        }
    }
}

/// Length of the complete command at the front of `buf`, if fully received.
fn command_len(buf: &[u8]) -> Option<usize> {
    let opcode = *buf.first()?;
    let len = match opcode {
        opcodes::SET_PASSWORD => 2 + *buf.get(1)? as usize,
        opcodes::ENCRYPT_SEQUENCE => {
            if buf.len() < 3 {
                return None;
            }
            3 + u16::from_be_bytes([buf[1], buf[2]]) as usize
        }
        opcodes::LOAD_DATA => 1 + STATE_BLOB_SIZE,
        opcodes::GET_CONFIG_VALUE => 3,
        opcodes::SET_CONFIG_VALUE => 4,
        opcodes::GET_CHECKSUM => 1,
        _ => 2,
    };
    (buf.len() >= len).then_some(len)
}

async fn reply(io: &mut DuplexStream, data: &[u8], chunk: usize) -> std::io::Result<()> {
    for piece in data.chunks(chunk.max(1)) {
        io.write_all(piece).await?;
        io.flush().await?;
    }
    Ok(())
}

async fn run(mut io: DuplexStream, options: DeviceOptions, received: Arc<Mutex<Vec<u8>>>) {
    let mut state = DeviceState::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 256];

    loop {
        let n = match io.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        received.lock().unwrap().extend_from_slice(&buf[..n]);
        pending.extend_from_slice(&buf[..n]);

        loop {
            if state.streaming {
                let out = state.transform(&pending);
                pending.clear();
                if reply(&mut io, &out, options.reply_chunk).await.is_err() {
                    return;
                }
                break;
            }

            let Some(len) = command_len(&pending) else {
                break;
            };
            let cmd: Vec<u8> = pending.drain(..len).collect();

            let response = if cmd[0] == opcodes::GET_FEATURES {
                options
                    .answer_handshake
                    .then(|| options.features.as_bytes().to_vec())
            } else {
                let response = state.handle(&cmd);
                if options.respond {
                    response
                } else {
                    None
                }
            };

            if let Some(data) = response {
                if reply(&mut io, &data, options.reply_chunk).await.is_err() {
                    return;
                }
            }
        }
    }
}
