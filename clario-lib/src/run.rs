use crate::constants::{OPTICS_SEPARATOR, RUN_PAD};
use crate::error::ValidationError;
use crate::plate::PlateCfg;
use crate::shaker::ShakerCfg;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Settings shared by every assay type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCfg {
    pub plate: PlateCfg,
    pub shake: ShakerCfg,
    /// Seconds to pause before reading; zero disables the pause
    pub pause_time: u16,
}

impl RunCfg {
    pub fn new(plate: PlateCfg) -> Self {
        RunCfg {
            plate,
            ..Default::default()
        }
    }

    /// Write the leading part of a run command: plate block, optics mode
    /// byte, padding, shaker field and the fixed separator.
    pub(crate) fn encode_prefix(&self, buf: &mut BytesMut, optics_mode: u8) -> Result<(), ValidationError> {
        let plate = self.plate.encode()?;
        let shake = self.shake.encode()?;
        buf.put(plate);
        buf.put_u8(optics_mode);
        buf.put_slice(&RUN_PAD);
        buf.put_slice(&shake);
        buf.put_slice(&OPTICS_SEPARATOR);
        Ok(())
    }

    /// Pause enable flag followed by the pause length
    pub(crate) fn encode_pause(&self, buf: &mut BytesMut) {
        buf.put_u8(u8::from(self.pause_time != 0));
        buf.put_u16(self.pause_time);
    }
}
