/// Device config module.
pub mod device;
/// Pipeline config module.
pub mod pipeline;

mod base;
mod logger;

pub use base::*;
pub use logger::{LogCrateLevel, LogLevel, LogSection, Logger, LoggerConfig};
