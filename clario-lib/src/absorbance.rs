//! Discrete (fixed wavelength) absorbance assays.
//!
//! TODO: spectral scans need the multi-command data readout, which is not
//! understood yet.

use crate::constants::{
    ABS_OPTICS_MODE, ABS_SAMPLES_OFFSET, ABS_TRAILER, ABS_UNKNOWN_BLOCK_A, ABS_UNKNOWN_BLOCK_B, ABS_WAVELENGTH_TAG,
    SCHEMA_DISCRETE_ABS,
};
use crate::error::{DecodeError, ValidationError};
use crate::response::{Readings, check_header};
use crate::run::RunCfg;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

pub const MAX_WAVELENGTHS: usize = 8;
pub const WAVELENGTH_RANGE_NM: (u16, u16) = (200, 1000);
pub const MAX_FLASHES: u16 = 200;
pub const MAX_SETTLING_TIME: u8 = 10;

/// Configuration of a discrete absorbance assay
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscreteAbsCfg {
    /// 1-8 wavelengths to measure, in nm (200-1000)
    pub wavelengths: Vec<u16>,
    /// Flashes per well, 0-200
    pub flashes: u16,
    /// Deciseconds, 0-10
    pub settling_time: u8,
}

impl DiscreteAbsCfg {
    fn validate(&self, run: &RunCfg) -> Result<(), ValidationError> {
        let count = self.wavelengths.len();
        if count == 0 || count > MAX_WAVELENGTHS {
            return Err(ValidationError::OutOfRange {
                field: "wavelength count",
                value: count as u32,
                min: 1,
                max: MAX_WAVELENGTHS as u32,
            });
        }
        let (min, max) = WAVELENGTH_RANGE_NM;
        if let Some(&w) = self.wavelengths.iter().find(|&&w| w < min || w > max) {
            return Err(ValidationError::OutOfRange {
                field: "wavelength",
                value: w.into(),
                min: min.into(),
                max: max.into(),
            });
        }
        if self.settling_time > MAX_SETTLING_TIME {
            return Err(ValidationError::OutOfRange {
                field: "settling_time",
                value: self.settling_time.into(),
                min: 0,
                max: MAX_SETTLING_TIME.into(),
            });
        }
        if self.flashes > MAX_FLASHES {
            return Err(ValidationError::OutOfRange {
                field: "flashes",
                value: self.flashes.into(),
                min: 0,
                max: MAX_FLASHES.into(),
            });
        }
        if run.plate.flying_mode {
            return Err(ValidationError::Incompatible {
                field: "flying_mode",
                conflict: "absorbance",
            });
        }
        Ok(())
    }

    /// Validate and serialize the run command
    pub fn encode(&self, run: &RunCfg) -> Result<Bytes, ValidationError> {
        self.validate(run)?;

        let mut buf = BytesMut::with_capacity(111 + self.wavelengths.len() * 2);
        run.encode_prefix(&mut buf, ABS_OPTICS_MODE)?;

        buf.put_u8(ABS_WAVELENGTH_TAG);
        buf.put_u8(self.wavelengths.len() as u8);
        for &w in &self.wavelengths {
            buf.put_u16(w * 10);
        }
        buf.put_slice(&ABS_UNKNOWN_BLOCK_A);
        run.encode_pause(&mut buf);
        buf.put_slice(&ABS_UNKNOWN_BLOCK_B);
        buf.put_u16(self.flashes);
        buf.put_slice(&ABS_TRAILER);

        Ok(buf.freeze())
    }
}

/// Known fields at the start of a discrete absorbance response
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct AbsResponseHeader {
    pub status: [u8; 6],
    pub schema: u8,
    pub total: U16,
    pub complete: U16,
    pub overflow: U32,
    pub unknown_15: u8,
    pub wavelengths: U16,
    pub unknown_18: [u8; 2],
    pub wells: U16,
    pub unknown_22: u8,
    /// Incubator temperature, tenths of a degree
    pub temperature: U16,
    pub unknown_25: [u8; 9],
}

/// Top and bottom of the ADC range measured for a wavelength channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub hi: f64,
    pub lo: f64,
}

impl Calibration {
    fn from_pair((hi, lo): (u32, u32)) -> Self {
        Calibration {
            hi: f64::from(hi),
            lo: f64::from(lo),
        }
    }

    /// Min-max normalize a raw reading into this range.
    ///
    /// A degenerate range (hi == lo) yields a non-finite value.
    pub fn normalize(&self, raw: f64) -> f64 {
        (raw - self.lo) / (self.hi - self.lo)
    }
}

/// Decoded discrete absorbance results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteAbsData {
    /// Values the run will produce in total
    pub total: u16,
    /// Values measured so far
    pub complete: u16,
    /// Wavelengths measured per well
    pub wavelengths: u16,
    pub wells: u16,
    /// Whole degrees Celsius, the tenths digit is truncated
    pub temperature: f64,
    pub overflow: u32,
    /// Percent transmission, indexed `[well][wavelength]`, wells in row-major order
    pub transmission: Vec<Vec<f64>>,
}

impl DiscreteAbsData {
    /// Decode a `get_data` response payload.
    ///
    /// The reading area holds, in order: `wells * wavelengths` samples
    /// (wavelength-major), one reference reading per well, a (hi, lo) pair per
    /// wavelength channel and a final (hi, lo) pair for the reference channel.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        check_header(payload, SCHEMA_DISCRETE_ABS)?;
        let (header, _) = AbsResponseHeader::ref_from_prefix(payload).map_err(|_| DecodeError::MalformedLength {
            what: "absorbance response header",
            expected: size_of::<AbsResponseHeader>(),
            actual: payload.len(),
        })?;

        let wells = usize::from(header.wells.get());
        let wavelengths = usize::from(header.wavelengths.get());

        let mut readings = Readings::new(payload, ABS_SAMPLES_OFFSET);
        let samples = readings.u32s(wells * wavelengths, "samples")?;
        let references = readings.u32s(wells, "well references")?;
        let chromats = (0..wavelengths)
            .map(|_| readings.pair("chromat calibration").map(Calibration::from_pair))
            .collect::<Result<Vec<_>, _>>()?;
        let reference_channel = Calibration::from_pair(readings.pair("reference channel calibration")?);

        let transmission = references
            .iter()
            .enumerate()
            .map(|(well, &reference)| {
                let reference = reference_channel.normalize(f64::from(reference));
                chromats
                    .iter()
                    .enumerate()
                    .map(|(channel, chromat)| {
                        let sample = chromat.normalize(f64::from(samples[well + channel * wells]));
                        sample / reference * 100.0
                    })
                    .collect()
            })
            .collect();

        Ok(DiscreteAbsData {
            total: header.total.get(),
            complete: header.complete.get(),
            wavelengths: header.wavelengths.get(),
            wells: header.wells.get(),
            temperature: f64::from(header.temperature.get() / 10),
            overflow: header.overflow.get(),
            transmission,
        })
    }
}
