//! Hardware-facing capabilities: sysfs GPIO lines, the memory-mapped
//! pull-up registers, board revision detection, and the I2C port expander.

pub mod board;
pub mod expander;
pub mod pullup;
pub mod sysfs;

use std::io;

use thiserror::Error;

/// Errors from the hardware-facing layers. All of these are fatal during
/// setup; teardown paths ignore them.
#[derive(Debug, Error)]
pub enum GpioError {
    /// The sysfs export file could not be written.
    #[error("can't open GPIO export file")]
    Export(#[source] io::Error),

    /// A per-pin sysfs attribute write failed.
    #[error("pin {pin}: config of '{attr}' failed")]
    Attr {
        /// Pin whose attribute was being written.
        pin: u8,
        /// Attribute filename under the pin directory.
        attr: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A pin's value file could not be opened or read.
    #[error("can't access pin {pin} value")]
    Value {
        /// Pin whose value file was being opened.
        pin: u8,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `/dev/mem` could not be opened for the GPIO register block.
    #[error("can't open /dev/mem")]
    Mem(#[source] io::Error),

    /// The GPIO register block could not be mapped.
    #[error("can't map GPIO registers")]
    Map(#[source] nix::Error),

    /// A port-expander bus transfer failed.
    #[error("expander bus error: {0}")]
    I2c(#[from] i2cdev::linux::LinuxI2CError),
}
