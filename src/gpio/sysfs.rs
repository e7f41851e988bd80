//! Sysfs GPIO line capability.
//!
//! Lines are exported, configured and read through the `/sys/class/gpio`
//! tree. The root directory is a parameter so tests can point the capability
//! at a temporary directory.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use log::debug;

use super::GpioError;

/// Handle on a sysfs GPIO tree.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    /// The real sysfs tree.
    #[must_use]
    pub fn system() -> Self {
        Self::with_root("/sys/class/gpio")
    }

    /// A tree rooted elsewhere (used by tests).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    /// Exports a pin for userspace access. Idempotent: a pin that already
    /// has its sysfs directory is left alone.
    pub fn export(&self, pin: u8) -> Result<(), GpioError> {
        if self.pin_dir(pin).exists() {
            return Ok(());
        }
        fs::write(self.root.join("export"), pin.to_string()).map_err(GpioError::Export)
    }

    /// Un-exports a pin. Teardown path: errors are ignored, the pin may be
    /// in a partially-initialized state.
    pub fn unexport(&self, pin: u8) {
        if let Err(err) = fs::write(self.root.join("unexport"), pin.to_string()) {
            debug!("unexport of pin {pin} failed: {err}");
        }
    }

    /// Writes one attribute file under the pin's directory.
    pub fn write_attr(&self, pin: u8, attr: &'static str, value: &str) -> Result<(), GpioError> {
        fs::write(self.pin_dir(pin).join(attr), value)
            .map_err(|source| GpioError::Attr { pin, attr, source })
    }

    /// Best-effort attribute write for teardown paths.
    pub fn write_attr_quiet(&self, pin: u8, attr: &'static str, value: &str) {
        if let Err(err) = self.write_attr(pin, attr, value) {
            debug!("teardown write failed: {err}");
        }
    }

    /// Opens a pin's value file for level reads.
    pub fn open_value(&self, pin: u8) -> Result<File, GpioError> {
        File::open(self.pin_dir(pin).join("value"))
            .map_err(|source| GpioError::Value { pin, source })
    }
}

/// Reads the debounce-relevant level from an open value file.
///
/// Buttons pull the line to ground, so `'0'` means pressed. A short read is
/// tolerated (`Ok(None)`); the next debounce cycle re-synchronizes.
pub fn read_pressed(mut file: &File) -> io::Result<Option<bool>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 1];
    let n = file.read(&mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(match buf[0] {
        b'0' => Some(true),
        b'1' => Some(false),
        _ => None,
    })
}
