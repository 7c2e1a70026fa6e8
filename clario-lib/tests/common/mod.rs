//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use clario_lib::error::{ClarioError, DecodeError, FrameError, FramePhase, ValidationError};
#[allow(unused_imports)]
pub use clario_lib::frame::{FrameCodec, decode_frame, encode_frame};
#[allow(unused_imports)]
pub use clario_lib::*;

use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

/// Status flag bytes with only VALID and INITIALIZED raised
#[allow(dead_code)]
pub const IDLE: [u8; 5] = [0x00, 0x01, 0x00, 0x20, 0x00];

/// Status flag bytes of a running measurement
#[allow(dead_code)]
pub const BUSY: [u8; 5] = [0x00, 0x31, 0x00, 0x28, 0x00];

/// Full 17-byte status payload with the given flag bytes
#[allow(dead_code)]
pub fn status_payload(flags: [u8; 5]) -> Vec<u8> {
    let mut payload = vec![0u8; 17];
    payload[..5].copy_from_slice(&flags);
    payload
}

/// Route library logs to the test harness output, once per test binary
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Vec<u8> {
    hex::decode(hex_data).expect("Failed to decode hex")
}

/// Stand-in for the reader on the far end of an in-memory link.
///
/// Answers each incoming frame with the next scripted reply and hands back
/// every request payload it saw once the script is used up.
#[allow(dead_code)]
pub fn spawn_instrument(replies: Vec<Vec<u8>>) -> (DuplexStream, JoinHandle<Vec<Bytes>>) {
    let (client, server) = tokio::io::duplex(4096);
    let handle = tokio::spawn(async move {
        let mut codec = FrameCodec::new(server);
        let mut requests = Vec::new();
        for reply in replies {
            let request = codec.read_frame().await.expect("instrument failed to read request");
            requests.push(request);
            codec.write_frame(&reply).await.expect("instrument failed to reply");
        }
        requests
    });
    (client, handle)
}

/// Raw readings of a discrete absorbance response
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct AbsReadings {
    pub total: u16,
    pub complete: u16,
    pub wavelengths: u16,
    pub wells: u16,
    pub temperature: u16,
    pub overflow: u32,
    pub samples: Vec<u32>,
    pub references: Vec<u32>,
    pub chromats: Vec<(u32, u32)>,
    pub reference_channel: (u32, u32),
}

#[allow(dead_code)]
impl AbsReadings {
    /// Lay the readings out the way the reader sends them
    pub fn payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 36];
        p[6] = 0x29;
        p[7..9].copy_from_slice(&self.total.to_be_bytes());
        p[9..11].copy_from_slice(&self.complete.to_be_bytes());
        p[11..15].copy_from_slice(&self.overflow.to_be_bytes());
        p[16..18].copy_from_slice(&self.wavelengths.to_be_bytes());
        p[20..22].copy_from_slice(&self.wells.to_be_bytes());
        p[23..25].copy_from_slice(&self.temperature.to_be_bytes());
        for v in self.samples.iter().chain(&self.references) {
            p.extend_from_slice(&v.to_be_bytes());
        }
        for (hi, lo) in self.chromats.iter().chain(std::iter::once(&self.reference_channel)) {
            p.extend_from_slice(&hi.to_be_bytes());
            p.extend_from_slice(&lo.to_be_bytes());
        }
        p
    }
}

/// Fluorescence response carrying `values`
#[allow(dead_code)]
pub fn fl_payload(total: u16, wells: u16, temperature: u16, values: &[u32]) -> Vec<u8> {
    let mut p = vec![0u8; 34];
    p[6] = 0x21;
    p[7..9].copy_from_slice(&total.to_be_bytes());
    p[9..11].copy_from_slice(&(values.len() as u16).to_be_bytes());
    p[16..18].copy_from_slice(&1u16.to_be_bytes());
    p[18..20].copy_from_slice(&wells.to_be_bytes());
    p[25..27].copy_from_slice(&temperature.to_be_bytes());
    for v in values {
        p.extend_from_slice(&v.to_be_bytes());
    }
    p
}
