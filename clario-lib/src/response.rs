//! Data responses returned by the `get_data` command.
//!
//! Byte 6 of the payload identifies the schema; the known header fields of
//! every schema sit inside the first [`DATA_HEADER_SIZE`] bytes and are
//! followed by big-endian 32-bit readings.

use crate::absorbance::DiscreteAbsData;
use crate::constants::{DATA_HEADER_SIZE, SCHEMA_DISCRETE_ABS, SCHEMA_FLUORESCENCE, SCHEMA_OFFSET};
use crate::error::DecodeError;
use crate::fluorescence::FlData;
use serde::{Deserialize, Serialize};

/// A decoded measurement, whichever assay produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "assay", rename_all = "snake_case")]
pub enum DataResponse {
    DiscreteAbsorbance(DiscreteAbsData),
    Fluorescence(FlData),
}

impl TryFrom<&[u8]> for DataResponse {
    type Error = DecodeError;

    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        check_min_len(payload)?;
        match payload[SCHEMA_OFFSET] {
            SCHEMA_DISCRETE_ABS => DiscreteAbsData::decode(payload).map(DataResponse::DiscreteAbsorbance),
            SCHEMA_FLUORESCENCE => FlData::decode(payload).map(DataResponse::Fluorescence),
            other => Err(DecodeError::UnknownSchema(other)),
        }
    }
}

pub(crate) fn check_min_len(payload: &[u8]) -> Result<(), DecodeError> {
    if payload.len() < DATA_HEADER_SIZE {
        return Err(DecodeError::MalformedLength {
            what: "data response shorter than its header",
            expected: DATA_HEADER_SIZE,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Validate length and schema byte of a data response
pub(crate) fn check_header(payload: &[u8], schema: u8) -> Result<(), DecodeError> {
    check_min_len(payload)?;
    let actual = payload[SCHEMA_OFFSET];
    if actual != schema {
        return Err(DecodeError::SchemaMismatch {
            expected: schema,
            actual,
        });
    }
    Ok(())
}

/// Sequential big-endian reader over the reading area of a response
pub(crate) struct Readings<'a> {
    payload: &'a [u8],
    offset: usize,
}

impl<'a> Readings<'a> {
    pub(crate) fn new(payload: &'a [u8], offset: usize) -> Self {
        Readings { payload, offset }
    }

    fn take<const N: usize>(&mut self, section: &'static str) -> Result<[u8; N], DecodeError> {
        let available = self.payload.len().saturating_sub(self.offset);
        let bytes = self
            .payload
            .get(self.offset..self.offset + N)
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or(DecodeError::TruncatedData {
                section,
                offset: self.offset,
                needed: N,
                available,
            })?;
        self.offset += N;
        Ok(bytes)
    }

    pub(crate) fn u32(&mut self, section: &'static str) -> Result<u32, DecodeError> {
        self.take::<4>(section).map(u32::from_be_bytes)
    }

    /// A (hi, lo) calibration pair, read as one 8-byte unit
    pub(crate) fn pair(&mut self, section: &'static str) -> Result<(u32, u32), DecodeError> {
        let bytes = self.take::<8>(section)?;
        let hi = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let lo = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok((hi, lo))
    }

    pub(crate) fn u32s(&mut self, count: usize, section: &'static str) -> Result<Vec<u32>, DecodeError> {
        (0..count).map(|_| self.u32(section)).collect()
    }
}
