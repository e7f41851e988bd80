//! Data models for input lines, combos, and the loaded configuration.

use std::fmt;
use std::time::Duration;

use evdev::Key;

use crate::constants::{DEBOUNCE_TIME, REPEAT_DELAY, REPEAT_INTERVAL};

/// Port expander register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    /// Bank A (GPIOA register).
    A,
    /// Bank B (GPIOB register).
    B,
}

/// Identity of one physical input line.
///
/// GPIO pins occupy bits 0-31 of the combined line bitmask; expander bank A
/// occupies bits 32-39 and bank B bits 40-47.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinId {
    /// A header GPIO pin (0-31).
    Gpio(u8),
    /// One bit of a port-expander bank.
    Expander {
        /// Which expander bank the bit lives in.
        bank: Bank,
        /// Bit position within the bank (0-7).
        bit: u8,
    },
}

impl PinId {
    /// Position of this line in the combined `u64` bitmask.
    #[must_use]
    pub fn mask_bit(self) -> u64 {
        match self {
            Self::Gpio(pin) => 1 << pin,
            Self::Expander { bank: Bank::A, bit } => 1 << (32 + bit),
            Self::Expander { bank: Bank::B, bit } => 1 << (40 + bit),
        }
    }

    /// Returns the GPIO pin number for header pins, `None` for expander bits.
    #[must_use]
    pub fn as_gpio(self) -> Option<u8> {
        match self {
            Self::Gpio(pin) => Some(pin),
            Self::Expander { .. } => None,
        }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpio(pin) => write!(f, "{pin}"),
            Self::Expander { bank: Bank::A, bit } => write!(f, "A{bit}"),
            Self::Expander { bank: Bank::B, bit } => write!(f, "B{bit}"),
        }
    }
}

/// What a configured line is wired up to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMapping {
    /// Emits the given key code on press/release.
    Key(Key),
    /// Driven low as a spare ground point; never read.
    Ground,
    /// Read as an input but only participates in the combo.
    ComboOnly,
}

/// One configured line, static for the lifetime of a loaded configuration.
///
/// The runtime levels (raw, debounced, last emitted) live in the engine's
/// per-line state so this stays immutable between reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLine {
    /// Which physical line this is.
    pub pin: PinId,
    /// What the line does.
    pub mapping: LineMapping,
}

impl InputLine {
    /// True for lines driven as spare grounds.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.mapping == LineMapping::Ground
    }

    /// The key this line emits, if any.
    #[must_use]
    pub fn key(&self) -> Option<Key> {
        match self.mapping {
            LineMapping::Key(key) => Some(key),
            LineMapping::Ground | LineMapping::ComboOnly => None,
        }
    }
}

/// The simultaneous-hold shortcut ("Vulcan pinch").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboMask {
    /// Bitmask of member lines (see [`PinId::mask_bit`]).
    pub pins: u64,
    /// Key synthesized when the hold completes.
    pub target_key: Key,
    /// How long the full set must be held before firing.
    pub hold: Duration,
}

impl ComboMask {
    /// Whether every member line is set in `pressed`.
    #[must_use]
    pub fn covered_by(&self, pressed: u64) -> bool {
        pressed & self.pins == self.pins
    }
}

/// Port-expander attachment settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpanderConfig {
    /// GPIO pin the expander's INT output is wired to.
    pub irq_pin: u8,
}

/// A fully parsed configuration.
///
/// Immutable once loaded; hot reload replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Lines in directive order.
    pub lines: Vec<InputLine>,
    /// The combo, if one was configured.
    pub combo: Option<ComboMask>,
    /// Expander attachment, if enabled.
    pub expander: Option<ExpanderConfig>,
    /// Debounce window.
    pub debounce_time: Duration,
    /// Delay before the first key repeat.
    pub repeat_delay: Duration,
    /// Starting interval between repeats.
    pub repeat_interval: Duration,
}

impl Configuration {
    /// A configuration with no lines and the default timing windows.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            combo: None,
            expander: None,
            debounce_time: DEBOUNCE_TIME,
            repeat_delay: REPEAT_DELAY,
            repeat_interval: REPEAT_INTERVAL,
        }
    }

    /// True when nothing is mapped at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Readable lines (everything except grounds), in directive order.
    ///
    /// The position in this iteration is the line index used by the engine
    /// and the pin manager; both sides must enumerate identically.
    pub fn input_lines(&self) -> impl Iterator<Item = &InputLine> {
        self.lines.iter().filter(|line| !line.is_ground())
    }

    /// Every key code the virtual keyboard must be able to emit.
    #[must_use]
    pub fn mapped_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.lines.iter().filter_map(InputLine::key).collect();
        if let Some(combo) = &self.combo {
            keys.push(combo.target_key);
        }
        keys
    }

    /// Bitmask of header GPIO pins that need the internal pull-up: every
    /// readable GPIO line plus the expander IRQ line.
    #[must_use]
    pub fn pullup_mask(&self) -> u32 {
        let mut mask = 0u32;
        for line in self.input_lines() {
            if let Some(pin) = line.pin.as_gpio() {
                mask |= 1 << pin;
            }
        }
        if let Some(expander) = &self.expander {
            mask |= 1 << expander.irq_pin;
        }
        mask
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COMBO_HOLD_TIME;

    #[test]
    fn mask_bits_partition_the_pin_space() {
        assert_eq!(PinId::Gpio(0).mask_bit(), 1);
        assert_eq!(PinId::Gpio(31).mask_bit(), 1 << 31);
        assert_eq!(PinId::Expander { bank: Bank::A, bit: 0 }.mask_bit(), 1 << 32);
        assert_eq!(PinId::Expander { bank: Bank::B, bit: 7 }.mask_bit(), 1 << 47);
    }

    #[test]
    fn input_lines_skip_grounds() {
        let cfg = Configuration {
            lines: vec![
                InputLine { pin: PinId::Gpio(4), mapping: LineMapping::Key(Key::KEY_LEFT) },
                InputLine { pin: PinId::Gpio(5), mapping: LineMapping::Ground },
                InputLine { pin: PinId::Gpio(6), mapping: LineMapping::ComboOnly },
            ],
            ..Configuration::empty()
        };
        let pins: Vec<PinId> = cfg.input_lines().map(|l| l.pin).collect();
        assert_eq!(pins, vec![PinId::Gpio(4), PinId::Gpio(6)]);
    }

    #[test]
    fn pullup_mask_covers_inputs_and_irq() {
        let cfg = Configuration {
            lines: vec![
                InputLine { pin: PinId::Gpio(4), mapping: LineMapping::Key(Key::KEY_LEFT) },
                InputLine { pin: PinId::Gpio(5), mapping: LineMapping::Ground },
                InputLine {
                    pin: PinId::Expander { bank: Bank::A, bit: 2 },
                    mapping: LineMapping::Key(Key::KEY_Z),
                },
            ],
            expander: Some(ExpanderConfig { irq_pin: 17 }),
            ..Configuration::empty()
        };
        assert_eq!(cfg.pullup_mask(), (1 << 4) | (1 << 17));
    }

    #[test]
    fn combo_coverage() {
        let combo = ComboMask {
            pins: PinId::Gpio(23).mask_bit() | PinId::Gpio(18).mask_bit(),
            target_key: Key::KEY_ESC,
            hold: COMBO_HOLD_TIME,
        };
        let partial = PinId::Gpio(23).mask_bit();
        assert!(!combo.covered_by(partial));
        assert!(combo.covered_by(combo.pins | PinId::Gpio(2).mask_bit()));
    }

    #[test]
    fn mapped_keys_include_combo_target() {
        let cfg = Configuration {
            lines: vec![
                InputLine { pin: PinId::Gpio(4), mapping: LineMapping::Key(Key::KEY_LEFT) },
                InputLine { pin: PinId::Gpio(5), mapping: LineMapping::Ground },
            ],
            combo: Some(ComboMask {
                pins: PinId::Gpio(4).mask_bit() | PinId::Gpio(6).mask_bit(),
                target_key: Key::KEY_ESC,
                hold: COMBO_HOLD_TIME,
            }),
            ..Configuration::empty()
        };
        assert_eq!(cfg.mapped_keys(), vec![Key::KEY_LEFT, Key::KEY_ESC]);
    }
}
