//! Plate geometry, well selection and scan order.
//!
//! The plate block leads every run command and is identical for all assay
//! types. Geometry is given in hundredths of a millimetre.

use crate::constants::{PLATE_BLOCK_SIZE, PLATE_TAG, WELL_MASK_SIZE};
use crate::error::ValidationError;
use bytes::{BufMut, Bytes, BytesMut};
use modular_bitfield::prelude::*;
use num_enum::IntoPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Corner of the plate the reader starts measuring from.
///
/// Bit 0 is always set in the observed codes; bits 1-2 select the corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Corner {
    #[default]
    TopLeft = 0b001,
    TopRight = 0b011,
    BottomLeft = 0b101,
    BottomRight = 0b111,
}

/// Scan mode byte closing the plate block
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanMode {
    #[skip]
    unused: bool,
    /// Unknown, set in every captured run command
    pub always_set: bool,
    pub flying_mode: bool,
    pub vertical: bool,
    pub start_corner: B3,
    pub unidirectional: bool,
}

/// 384-bit well selection, row major, bit 7 of byte 0 is well 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellMask([u8; WELL_MASK_SIZE]);

impl Default for WellMask {
    fn default() -> Self {
        WellMask([0; WELL_MASK_SIZE])
    }
}

impl WellMask {
    pub fn as_bytes(&self) -> &[u8; WELL_MASK_SIZE] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

/// Plate geometry and measurement ordering
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateCfg {
    /// Plate length, e.g. 12776 for 127.76 mm
    pub length: u16,
    /// Plate width, e.g. 8548 for 85.48 mm
    pub width: u16,
    /// Top left corner to the centre of well 0 along the length
    pub corner_x: u16,
    /// Top left corner to the centre of well 0 along the width
    pub corner_y: u16,
    /// Well diameter, bounds the orbital averaging diameter
    pub well_dia: u16,
    pub cols: u8,
    pub rows: u8,
    pub start_corner: Corner,
    /// Read in one direction only, returning to the origin edge each line
    pub uni: bool,
    /// Read columns instead of rows
    pub vert: bool,
    /// Keep the stage moving and measure over each well centre
    pub flying_mode: bool,
    #[serde(skip)]
    wells: WellMask,
}

impl PlateCfg {
    /// Standard 96-well SBS plate read from the top left corner
    pub fn sbs_96() -> Self {
        PlateCfg {
            length: 12776,
            width: 8548,
            corner_x: 1438,
            corner_y: 1124,
            cols: 12,
            rows: 8,
            ..Default::default()
        }
    }

    pub fn wells(&self) -> &WellMask {
        &self.wells
    }

    pub fn well_count(&self) -> usize {
        usize::from(self.cols) * usize::from(self.rows)
    }

    /// Restrict the run to the given zero-based, row-major well indices.
    ///
    /// Without a selection every well on the plate is read. The bitmap byte is
    /// picked with `index / rows`, which is how captured commands lay it out;
    /// it only lines up with a row-major bitmap on 8-row plates.
    pub fn set_wells(&mut self, indices: impl IntoIterator<Item = usize>) -> Result<(), ValidationError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ValidationError::GridNotSet);
        }
        let rows = usize::from(self.rows);
        let mut mask = self.wells;
        for index in indices {
            let byte = index / rows;
            let slot = mask
                .0
                .get_mut(byte)
                .ok_or(ValidationError::WellOutOfRange { index, byte })?;
            *slot |= 1u8 << (7 - index % 8);
        }
        self.wells = mask;
        Ok(())
    }

    /// Drop any explicit selection, reading the whole plate again
    pub fn clear_wells(&mut self) {
        self.wells = WellMask::default();
    }

    fn scan_mode(&self) -> ScanMode {
        ScanMode::new()
            .with_always_set(true)
            .with_flying_mode(self.flying_mode)
            .with_vertical(self.vert)
            .with_start_corner(self.start_corner.into())
            .with_unidirectional(self.uni)
    }

    /// Serialize the plate block
    pub fn encode(&self) -> Result<Bytes, ValidationError> {
        for (field, value) in [
            ("length", self.length),
            ("width", self.width),
            ("corner_x", self.corner_x),
            ("corner_y", self.corner_y),
        ] {
            if value == 0 {
                return Err(ValidationError::PlateNotSet { field });
            }
        }

        let mut buf = BytesMut::with_capacity(PLATE_BLOCK_SIZE);
        buf.put_u8(PLATE_TAG);
        buf.put_u16(self.length);
        buf.put_u16(self.width);
        buf.put_u16(self.corner_x);
        buf.put_u16(self.corner_y);
        buf.put_u16(self.length.wrapping_sub(self.corner_x));
        buf.put_u16(self.width.wrapping_sub(self.corner_y));
        buf.put_u8(self.cols);
        buf.put_u8(self.rows);

        let mut wells = self.wells;
        if wells.is_empty() {
            // no selection: read every well on the plate
            let full = (self.well_count() / 8).min(WELL_MASK_SIZE);
            wells.0[..full].fill(0xff);
        }
        buf.put_slice(wells.as_bytes());
        buf.put_slice(&self.scan_mode().into_bytes());

        Ok(buf.freeze())
    }
}
