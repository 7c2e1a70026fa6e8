use crate::error::ValidationError;
use num_enum::IntoPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ShakeType {
    #[default]
    Orbital = 0,
    Linear = 1,
    DoubleOrbital = 2,
    Meander = 3,
}

/// Shake speeds are only available in 100 rpm steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Display, IntoPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShakeSpeed {
    #[default]
    #[strum(to_string = "100 rpm")]
    #[serde(rename = "100")]
    Rpm100 = 0,
    #[strum(to_string = "200 rpm")]
    #[serde(rename = "200")]
    Rpm200 = 1,
    #[strum(to_string = "300 rpm")]
    #[serde(rename = "300")]
    Rpm300 = 2,
    #[strum(to_string = "400 rpm")]
    #[serde(rename = "400")]
    Rpm400 = 3,
    #[strum(to_string = "500 rpm")]
    #[serde(rename = "500")]
    Rpm500 = 4,
    #[strum(to_string = "600 rpm")]
    #[serde(rename = "600")]
    Rpm600 = 5,
    #[strum(to_string = "700 rpm")]
    #[serde(rename = "700")]
    Rpm700 = 6,
}

impl ShakeSpeed {
    pub fn as_rpm(&self) -> u16 {
        (u16::from(u8::from(*self)) + 1) * 100
    }
}

/// Shake-before-read configuration of the xy stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakerCfg {
    pub shake_type: ShakeType,
    pub speed: ShakeSpeed,
    /// Seconds; zero disables shaking
    pub duration: u16,
}

impl ShakerCfg {
    /// Serialize the 4-byte shaker field
    pub fn encode(&self) -> Result<[u8; 4], ValidationError> {
        if self.shake_type == ShakeType::Meander && self.speed > ShakeSpeed::Rpm300 {
            return Err(ValidationError::MeanderTooFast {
                rpm: self.speed.as_rpm(),
            });
        }
        if self.duration == 0 {
            return Ok([0; 4]);
        }
        let [hi, lo] = self.duration.to_be_bytes();
        Ok([0x10 | u8::from(self.shake_type), self.speed.into(), hi, lo])
    }
}
