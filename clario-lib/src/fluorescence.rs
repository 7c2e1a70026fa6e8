//! Endpoint fluorescence intensity with the monochromators.
//!
//! Only a single excitation/emission pair is supported; filter based and
//! multichromatic reads change the optics block in ways not captured yet.

use crate::constants::{
    FL_ORBITAL_TAG, FL_TRAILER, FL_UNKNOWN_BLOCK_A, FL_UNKNOWN_BLOCK_B, FL_UNKNOWN_BLOCK_C, SCHEMA_FLUORESCENCE,
};
use crate::error::{DecodeError, ValidationError};
use crate::response::{Readings, check_header};
use crate::run::RunCfg;
use bytes::{BufMut, Bytes, BytesMut};
use modular_bitfield::prelude::*;
use serde::{Deserialize, Serialize};
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

pub const MAX_FLASHES: u16 = 200;
pub const MAX_FLYING_FLASHES: u16 = 3;
/// Flying mode on plates with more than 96 wells allows a single flash
pub const MAX_FLYING_FLASHES_DENSE: u16 = 1;
pub const MAX_FLASHES_PER_ORBIT_MM: u16 = 17;
pub const MAX_SETTLING_TIME: u8 = 10;

const DENSE_PLATE_WELLS: usize = 96;

/// Optics mode byte following the plate block
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpticsMode {
    #[skip]
    unused_low: B4,
    /// Both bits are raised together when orbital averaging
    pub orbital_averaging: B2,
    pub bottom_optic: bool,
    #[skip]
    unused_high: bool,
}

/// Configuration of an endpoint fluorescence read
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlCfg {
    /// Excitation centre wavelength, nm
    pub ex: u16,
    /// Excitation bandwidth
    pub ex_bw: u16,
    /// Dichroic wavelength * 10
    pub dich: u16,
    /// Emission centre wavelength, nm
    pub em: u16,
    /// Emission bandwidth
    pub em_bw: u16,
    pub gain: u16,
    /// Focal height (mm) * 100
    pub focal_height: u16,
    /// 0-200, at most 3 in flying mode
    pub flashes: u16,
    /// Read from below instead of the default top optic
    pub bottom_optic: bool,
    /// Deciseconds, 0-10
    pub settling_time: u8,
    /// Orbital averaging diameter in mm, 0 disables
    pub orbit_avg: u8,
}

fn flash_limit(flashes: u16, max: u16) -> Result<(), ValidationError> {
    if flashes > max {
        return Err(ValidationError::OutOfRange {
            field: "flashes",
            value: flashes.into(),
            min: 0,
            max: max.into(),
        });
    }
    Ok(())
}

impl FlCfg {
    fn validate(&self, run: &RunCfg) -> Result<(), ValidationError> {
        let plate = &run.plate;
        if plate.flying_mode {
            if plate.well_count() > DENSE_PLATE_WELLS {
                flash_limit(self.flashes, MAX_FLYING_FLASHES_DENSE)?;
            }
            flash_limit(self.flashes, MAX_FLYING_FLASHES)?;
        }
        flash_limit(self.flashes, MAX_FLASHES)?;

        if self.orbit_avg > 0 {
            let max_diameter = plate.well_dia / 100;
            if u16::from(self.orbit_avg) > max_diameter {
                return Err(ValidationError::OutOfRange {
                    field: "orbit_avg",
                    value: self.orbit_avg.into(),
                    min: 0,
                    max: max_diameter.into(),
                });
            }
            flash_limit(self.flashes, u16::from(self.orbit_avg) * MAX_FLASHES_PER_ORBIT_MM)?;
            if plate.flying_mode {
                return Err(ValidationError::Incompatible {
                    field: "orbit_avg",
                    conflict: "flying_mode",
                });
            }
        }

        if self.settling_time > MAX_SETTLING_TIME {
            return Err(ValidationError::OutOfRange {
                field: "settling_time",
                value: self.settling_time.into(),
                min: 0,
                max: MAX_SETTLING_TIME.into(),
            });
        }
        Ok(())
    }

    fn optics_mode(&self) -> OpticsMode {
        OpticsMode::new()
            .with_bottom_optic(self.bottom_optic)
            .with_orbital_averaging(if self.orbit_avg > 0 { 0b11 } else { 0 })
    }

    /// Settling byte: the reader wants at least 1
    fn settling_code(&self) -> u8 {
        if self.settling_time == 0 {
            1
        } else {
            self.settling_time * 10 / 2
        }
    }

    /// Validate and serialize the run command
    pub fn encode(&self, run: &RunCfg) -> Result<Bytes, ValidationError> {
        self.validate(run)?;

        let mut buf = BytesMut::with_capacity(125);
        run.encode_prefix(&mut buf, self.optics_mode().into_bytes()[0])?;

        if self.orbit_avg > 0 {
            buf.put_u8(FL_ORBITAL_TAG);
            buf.put_u8(self.orbit_avg);
            buf.put_u16(run.plate.well_dia);
            buf.put_u8(0x00);
        }

        buf.put_u8(self.settling_code());
        buf.put_u16(self.focal_height);
        buf.put_slice(&FL_UNKNOWN_BLOCK_A);

        buf.put_u16(self.gain);
        let ex = self.ex.wrapping_mul(10);
        buf.put_u16(ex.wrapping_add(self.ex_bw));
        buf.put_u16(ex.wrapping_sub(self.ex_bw));
        buf.put_u16(self.dich);
        let em = self.em.wrapping_mul(10);
        buf.put_u16(em.wrapping_add(self.em_bw));
        buf.put_u16(em.wrapping_sub(self.em_bw));
        buf.put_slice(&FL_UNKNOWN_BLOCK_B);

        run.encode_pause(&mut buf);
        buf.put_slice(&FL_UNKNOWN_BLOCK_C);
        buf.put_u16(self.flashes);
        buf.put_slice(&FL_TRAILER);

        Ok(buf.freeze())
    }
}

/// Known fields at the start of a fluorescence response
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FlResponseHeader {
    pub status: [u8; 6],
    pub schema: u8,
    pub total: U16,
    pub complete: U16,
    pub overflow: U32,
    pub unknown_15: u8,
    pub multichromats: U16,
    pub wells: U16,
    pub unknown_20: [u8; 5],
    /// Incubator temperature, tenths of a degree
    pub temperature: U16,
    pub unknown_27: [u8; 7],
}

/// Decoded endpoint fluorescence results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlData {
    /// Values the run will produce in total
    pub total: u16,
    /// Values measured so far
    pub complete: u16,
    /// Multichromats per well, always 1 for now
    pub multichromats: u16,
    pub wells: u16,
    /// Whole degrees Celsius, the tenths digit is truncated
    pub temperature: f64,
    pub overflow: u32,
    /// Raw intensities in row-major well order
    pub values: Vec<u32>,
}

impl FlData {
    /// Decode a `get_data` response payload
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        check_header(payload, SCHEMA_FLUORESCENCE)?;
        let (header, readings) =
            FlResponseHeader::ref_from_prefix(payload).map_err(|_| DecodeError::MalformedLength {
                what: "fluorescence response header",
                expected: size_of::<FlResponseHeader>(),
                actual: payload.len(),
            })?;

        let complete = header.complete.get();
        let values = Readings::new(payload, payload.len() - readings.len()).u32s(complete.into(), "values")?;

        Ok(FlData {
            total: header.total.get(),
            complete,
            multichromats: header.multichromats.get(),
            wells: header.wells.get(),
            temperature: f64::from(header.temperature.get() / 10),
            overflow: header.overflow.get(),
            values,
        })
    }
}
