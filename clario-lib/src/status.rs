//! Status response and its single-bit flags.
//!
//! Only the leading five bytes are understood. Many other bytes change
//! during a run and spectral reads appear to use a different layout after
//! the flag bytes.

use crate::constants::{STATUS_FLAG_BYTES, STATUS_RESPONSE_SIZE};
use crate::error::DecodeError;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum StatusFlag {
    Valid,
    /// Reliable indicator that the reader is working
    Busy,
    Running,
    /// Performing a run
    Active,
    /// No bit identified yet, never raised
    Idle,
    /// Possibly a schema bit rather than a state
    Standby,
    /// The init command has run since power on
    Initialized,
    LidOpen,
    /// Plate carrier is out
    Open,
    /// Only raised with the carrier in and a plate present
    PlateDetected,
    /// Z stage found the plate after loading
    ZProbed,
    /// Raised after a run, cleared by the first data read
    UnreadData,
    /// Filter cover under the lid is open
    FilterCoverOpen,
}

impl Serialize for StatusFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `(flag, byte index, mask)` against the leading status bytes
pub const STATUS_FLAG_TABLE: [(StatusFlag, usize, u8); 12] = [
    (StatusFlag::Standby, 0, 1 << 1),
    (StatusFlag::Valid, 1, 1 << 0),
    (StatusFlag::Busy, 1, 1 << 5),
    (StatusFlag::Running, 1, 1 << 4),
    (StatusFlag::UnreadData, 2, 1 << 0),
    (StatusFlag::Initialized, 3, 1 << 5),
    (StatusFlag::LidOpen, 3, 1 << 6),
    (StatusFlag::Open, 3, 1 << 0),
    (StatusFlag::PlateDetected, 3, 1 << 1),
    (StatusFlag::ZProbed, 3, 1 << 2),
    (StatusFlag::Active, 3, 1 << 3),
    (StatusFlag::FilterCoverOpen, 4, 1 << 6),
];

/// Set of raised status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags(u16);

impl StatusFlags {
    /// Apply the flag table to the leading status bytes
    pub fn from_flag_bytes(bytes: &[u8; STATUS_FLAG_BYTES]) -> Self {
        STATUS_FLAG_TABLE
            .iter()
            .filter(|(_, byte, mask)| bytes[*byte] & mask != 0)
            .fold(StatusFlags::default(), |set, (flag, _, _)| set.with(*flag))
    }

    pub fn with(self, flag: StatusFlag) -> Self {
        StatusFlags(self.0 | 1 << flag as u8)
    }

    pub fn contains(&self, flag: StatusFlag) -> bool {
        self.0 & (1 << flag as u8) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raised flags in table order
    pub fn iter(&self) -> impl Iterator<Item = StatusFlag> + '_ {
        STATUS_FLAG_TABLE
            .iter()
            .map(|(flag, _, _)| *flag)
            .filter(|flag| self.contains(*flag))
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|flag| flag.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

impl Serialize for StatusFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for flag in self.iter() {
            seq.serialize_element(&flag)?;
        }
        seq.end()
    }
}

/// A decoded status response
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Status {
    pub flags: StatusFlags,
    /// The complete response, most of it not understood yet
    pub raw: [u8; STATUS_RESPONSE_SIZE],
}

impl Status {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let raw: [u8; STATUS_RESPONSE_SIZE] = payload.try_into().map_err(|_| DecodeError::MalformedLength {
            what: "status response",
            expected: STATUS_RESPONSE_SIZE,
            actual: payload.len(),
        })?;
        let mut flag_bytes = [0u8; STATUS_FLAG_BYTES];
        flag_bytes.copy_from_slice(&raw[..STATUS_FLAG_BYTES]);
        Ok(Status {
            flags: StatusFlags::from_flag_bytes(&flag_bytes),
            raw,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.flags.contains(StatusFlag::Busy)
    }

    /// Leading bytes as bit strings, handy when hunting for new flags
    pub fn bit_dump(&self) -> String {
        self.raw[..=STATUS_FLAG_BYTES]
            .iter()
            .enumerate()
            .map(|(i, b)| format!("{i}: {b:08b}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flags)
    }
}
