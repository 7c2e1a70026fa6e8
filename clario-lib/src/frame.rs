//! Frame layer of the serial protocol.
//!
//! Every message in either direction is wrapped the same way:
//!
//! ```text
//! | STX | len (u16 BE) | 0x0c | payload ... | checksum (u16 BE) | CR |
//! ```
//!
//! `len` counts the whole frame. The checksum is the sum of every byte from
//! STX through the end of the payload, truncated to 16 bits.

use crate::constants::{CR, DEFAULT_READ_TIMEOUT, HEADER_MARKER, HEADER_SIZE, MIN_FRAME_SIZE, STX, TRAILER_SIZE};
use crate::error::{ClarioError, FrameError, FramePhase};
use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// Byte stream capability the codec needs: ordered, 8-bit clean, duplex.
///
/// Blanket-implemented for any tokio stream, so a serial port, a
/// `tokio::io::DuplexStream` or a TCP bridge all work.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// 16-bit truncated byte sum
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// Wrap a payload into a complete frame
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let total = payload.len() + MIN_FRAME_SIZE;
    let mut buf = BytesMut::with_capacity(total);
    buf.put_u8(STX);
    // the length field is 16 bits wide
    buf.put_u16(total as u16);
    buf.put_u8(HEADER_MARKER);
    buf.put_slice(payload);
    let sum = checksum(&buf);
    buf.put_u16(sum);
    buf.put_u8(CR);
    buf.freeze()
}

/// Validate a complete in-memory frame and return its payload
pub fn decode_frame(frame: &[u8]) -> Result<Bytes, FrameError> {
    if frame.len() < HEADER_SIZE {
        return Err(FrameError::Framing(format!(
            "frame of {} bytes is shorter than the header",
            frame.len()
        )));
    }
    let (header, body) = frame.split_at(HEADER_SIZE);
    let header: &[u8; HEADER_SIZE] = header
        .try_into()
        .map_err(|_| FrameError::Framing("invalid header length".to_string()))?;
    let declared = parse_header(header)?;
    if declared != frame.len() {
        return Err(FrameError::Framing(format!(
            "header declares {declared} bytes but frame is {} bytes",
            frame.len()
        )));
    }
    validate_body(header, body)
}

/// Check the start byte and return the declared total frame length
fn parse_header(header: &[u8; HEADER_SIZE]) -> Result<usize, FrameError> {
    if header[0] != STX {
        return Err(FrameError::Framing(format!(
            "header begins with {:#04x} instead of STX",
            header[0]
        )));
    }
    let declared = usize::from(u16::from_be_bytes([header[1], header[2]]));
    if declared < MIN_FRAME_SIZE {
        return Err(FrameError::Framing(format!(
            "declared length {declared} is below the {MIN_FRAME_SIZE}-byte minimum"
        )));
    }
    Ok(declared)
}

/// Verify checksum, then terminator, and strip both
fn validate_body(header: &[u8; HEADER_SIZE], body: &[u8]) -> Result<Bytes, FrameError> {
    let payload_len = body.len() - TRAILER_SIZE;
    let payload = &body[..payload_len];

    let computed = checksum(header).wrapping_add(checksum(payload));
    let received = u16::from_be_bytes([body[payload_len], body[payload_len + 1]]);
    if computed != received {
        return Err(FrameError::ChecksumInvalid { computed, received });
    }

    let last = body[body.len() - 1];
    if last != CR {
        return Err(FrameError::Framing(format!(
            "frame terminated with {last:#04x} instead of CR"
        )));
    }

    Ok(Bytes::copy_from_slice(payload))
}

/// Reads and writes frames over a [`Transport`].
///
/// Strictly request/response: a frame must be read completely before the
/// next one is written. After a timeout the stream may sit mid-frame, so the
/// transport should be flushed or reopened before reuse.
pub struct FrameCodec<T> {
    io: T,
    read_timeout: Duration,
}

impl<T: Transport> FrameCodec<T> {
    pub fn new(io: T) -> Self {
        Self::with_timeout(io, DEFAULT_READ_TIMEOUT)
    }

    pub fn with_timeout(io: T, read_timeout: Duration) -> Self {
        Self { io, read_timeout }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    /// Frame `payload` and write it out
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), ClarioError> {
        let frame = encode_frame(payload);
        debug!("-> {}", hex::encode(&frame));
        self.io.write_all(&frame).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Read one frame and return its payload.
    ///
    /// Header and body are read under separate deadlines.
    pub async fn read_frame(&mut self) -> Result<Bytes, ClarioError> {
        let mut header = [0u8; HEADER_SIZE];
        self.read_exact_within(&mut header, FramePhase::Header).await?;
        let declared = parse_header(&header)?;

        let mut body = vec![0u8; declared - HEADER_SIZE];
        self.read_exact_within(&mut body, FramePhase::Body).await?;
        debug!("<- {}{}", hex::encode(header), hex::encode(&body));

        Ok(validate_body(&header, &body)?)
    }

    /// Write a command frame and read the reply
    pub async fn transact(&mut self, payload: &[u8]) -> Result<Bytes, ClarioError> {
        self.write_frame(payload).await?;
        self.read_frame().await
    }

    async fn read_exact_within(&mut self, buf: &mut [u8], phase: FramePhase) -> Result<(), ClarioError> {
        let limit = self.read_timeout;
        let read = timeout(limit, self.io.read_exact(buf))
            .await
            .map_err(|_| FrameError::Timeout { phase, timeout: limit })?;
        read?;
        Ok(())
    }
}
