pub mod absorbance;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod fluorescence;
pub mod frame;
pub mod plate;
pub mod response;
pub mod run;
pub mod shaker;
pub mod status;

#[cfg(feature = "serial")]
pub mod serial;

// Re-export the session and the configuration types for easy access
pub use absorbance::{DiscreteAbsCfg, DiscreteAbsData};
pub use config::SessionConfig;
pub use device::{Clario, SessionState};
pub use error::ClarioError;
pub use fluorescence::{FlCfg, FlData};
pub use plate::{Corner, PlateCfg};
pub use run::RunCfg;
pub use shaker::{ShakeSpeed, ShakeType, ShakerCfg};
pub use status::{Status, StatusFlag, StatusFlags};

#[cfg(feature = "serial")]
pub use config::SerialConfig;
