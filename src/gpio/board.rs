//! Board revision detection.
//!
//! Only the distinctions that matter for GPIO compatibility are made: the
//! peripheral base address moved on the Pi 2, and the earliest revision-1
//! boards route a few header positions to different GPIO numbers. Detection
//! reads `/proc/cmdline`, as the firmware puts both the memory size and the
//! board revision there.

use std::fs;

/// Board classes with distinct GPIO behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardRevision {
    /// Pi 1 Model B revision 1 (no mounting holes).
    Pi1Rev1,
    /// Pi 1 revision 2, Model A/A+/B+.
    Pi1Rev2,
    /// Pi 2 Model B.
    Pi2,
}

/// Pin aliases for revision-1 boards: config files written for later boards
/// keep working without edits.
const REV1_ALIASES: &[(u8, u8)] = &[(2, 0), (3, 1), (27, 21)];

impl BoardRevision {
    /// Detects the running board, defaulting to Pi 1 revision 2 when the
    /// kernel command line gives no verdict.
    #[must_use]
    pub fn detect() -> Self {
        fs::read_to_string("/proc/cmdline")
            .map(|cmdline| Self::from_cmdline(&cmdline))
            .unwrap_or(Self::Pi1Rev2)
    }

    /// Classifies a kernel command line.
    #[must_use]
    pub fn from_cmdline(cmdline: &str) -> Self {
        for token in cmdline.split_whitespace() {
            if let Some(value) = token.strip_prefix("mem_size=").and_then(parse_hex) {
                if value == 0x3F00_0000 {
                    return Self::Pi2;
                }
            }
            if let Some(value) = token.strip_prefix("boardrev=").and_then(parse_hex) {
                if value == 0x02 || value == 0x03 {
                    return Self::Pi1Rev1;
                }
            }
        }
        Self::Pi1Rev2
    }

    /// Physical address of the GPIO register block.
    #[must_use]
    pub fn gpio_register_base(self) -> u32 {
        match self {
            Self::Pi1Rev1 | Self::Pi1Rev2 => 0x2020_0000,
            Self::Pi2 => 0x3F20_0000,
        }
    }

    /// The static pin-alias table for this revision.
    #[must_use]
    pub fn pin_aliases(self) -> &'static [(u8, u8)] {
        match self {
            Self::Pi1Rev1 => REV1_ALIASES,
            Self::Pi1Rev2 | Self::Pi2 => &[],
        }
    }
}

fn parse_hex(value: &str) -> Option<u32> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u32::from_str_radix(digits, 16).ok()
}
