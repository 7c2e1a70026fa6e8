use std::io;
use std::time::Duration;
use thiserror::Error;

/// The primary error type for the `clario-lib` library.
#[derive(Error, Debug)]
pub enum ClarioError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
}

/// A run configuration violates a documented instrument constraint.
///
/// Always raised before anything is written to the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("plate parameters not set: {field} must be nonzero")]
    PlateNotSet { field: &'static str },

    #[error("row and column count must be set before selecting wells")]
    GridNotSet,

    #[error("well {index} maps to bitmap byte {byte}, beyond the 48-byte well selection")]
    WellOutOfRange { index: usize, byte: usize },

    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("meander shake is limited to 300 rpm, got {rpm} rpm")]
    MeanderTooFast { rpm: u16 },

    #[error("{field} cannot be combined with {conflict}")]
    Incompatible {
        field: &'static str,
        conflict: &'static str,
    },
}

/// Transport or framing level failure while exchanging a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("timed out after {timeout:?} reading frame {phase}")]
    Timeout { phase: FramePhase, timeout: Duration },

    #[error("framing error: {0}")]
    Framing(String),

    #[error("invalid checksum: computed {computed:#06x}, frame carries {received:#06x}")]
    ChecksumInvalid { computed: u16, received: u16 },
}

/// Which of the two independently timed reads of a frame was in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FramePhase {
    #[strum(to_string = "header")]
    Header,
    #[strum(to_string = "body")]
    Body,
}

/// A response payload does not have the shape its decoder expects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{what}: expected {expected} bytes, got {actual}")]
    MalformedLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("response schema mismatch: expected {expected:#04x}, got {actual:#04x}")]
    SchemaMismatch { expected: u8, actual: u8 },

    #[error("unrecognized data response schema {0:#04x}")]
    UnknownSchema(u8),

    #[error("truncated {section} at offset {offset}: need {needed} bytes, {available} left")]
    TruncatedData {
        section: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
}
