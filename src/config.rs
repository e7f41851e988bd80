//! Config-file location policy.
//!
//! The directive file lives in the boot partition by default, named after
//! the binary (`/boot/gpiokeyd.cfg`). A command-line argument overrides it:
//! an absolute (or otherwise path-qualified) argument is used as-is, while a
//! bare filename is resolved against the default directory. The directory
//! and filename components are kept separate because the hot-reload
//! controller watches them with separate inotify instances.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::constants::{APP_BINARY_NAME, CONFIG_EXTENSION, DEFAULT_CONFIG_DIR};

/// Resolved location of the directive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Directory containing the config file (directory watch target).
    pub dir: PathBuf,
    /// Bare filename (matched against directory watch events).
    pub name: OsString,
    /// Full path (file watch and parse target).
    pub path: PathBuf,
}

/// Default config filename, derived from the binary name.
fn default_name() -> OsString {
    OsString::from(format!("{APP_BINARY_NAME}.{CONFIG_EXTENSION}"))
}

/// Resolves the config location from the optional CLI argument.
#[must_use]
pub fn resolve(arg: Option<&Path>) -> ConfigPaths {
    let (dir, name) = match arg {
        None => (PathBuf::from(DEFAULT_CONFIG_DIR), default_name()),
        Some(given) => {
            let name = given
                .file_name()
                .map_or_else(default_name, OsString::from);
            let dir = match given.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from(DEFAULT_CONFIG_DIR),
            };
            (dir, name)
        }
    };
    let path = dir.join(&name);
    ConfigPaths { dir, name, path }
}
