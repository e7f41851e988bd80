//! Application-wide constants.
//!
//! This module defines constants used throughout the daemon: application
//! naming, the default configuration location, and the timing windows of
//! the debounce/repeat/combo engine.

use std::time::Duration;

/// The display name of the application (human-readable).
pub const APP_NAME: &str = "GPIO Keypad Daemon";

/// The binary name of the application (used in command examples and as the
/// stem of the default config filename).
pub const APP_BINARY_NAME: &str = "gpiokeyd";

/// Directory searched for the config file when no path is given.
pub const DEFAULT_CONFIG_DIR: &str = "/boot";

/// Extension of the default config filename (`gpiokeyd.cfg`).
pub const CONFIG_EXTENSION: &str = "cfg";

/// Name given to the virtual keyboard device.
pub const KEYBOARD_DEVICE_NAME: &str = "gpiokeyd";

/// Stable level required on a line before its change is trusted.
pub const DEBOUNCE_TIME: Duration = Duration::from_millis(20);

/// Hold time before the combo fires its target key.
pub const COMBO_HOLD_TIME: Duration = Duration::from_millis(1500);

/// Delay between a press and the first synthesized repeat.
pub const REPEAT_DELAY: Duration = Duration::from_millis(500);

/// Interval between the first and second repeats; later repeats accelerate.
pub const REPEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Amount each repeat interval shrinks by after the second repeat.
pub const REPEAT_ACCEL: Duration = Duration::from_millis(5);

/// Shortest interval repeats accelerate down to.
pub const REPEAT_FLOOR: Duration = Duration::from_millis(30);

/// Gap between the combo's press and release emissions. Some consumers drop
/// the pair if it arrives back-to-back.
pub const COMBO_EVENT_GAP: Duration = Duration::from_millis(10);

/// Minimum settle period between the phases of the pull-up register protocol.
pub const PULLUP_SETTLE: Duration = Duration::from_micros(5);

/// I2C bus device the port expander is attached to.
pub const EXPANDER_BUS: &str = "/dev/i2c-1";

/// I2C address of the port expander.
pub const EXPANDER_ADDR: u16 = 0x20;
