//! Logging utilities.
//!
//! Logger initialization plus the [`DebugFlags`] mask that gates the noisier
//! per-draw diagnostics. Everything logs through the `log` facade.

mod flags;
mod init;

pub use flags::DebugFlags;
pub use init::{init_logging, LoggingConfig};
