//! Directive-file parsing.
//!
//! The config format is line-oriented: `<KEYNAME> <pin>[,<pin>...]` maps a
//! button (one pin) or registers the hold combo (two or more pins), and
//! `GND <pin>[,<pin>...]` turns pins into spare ground points. `#` starts a
//! comment to end of line. Pin lists may be separated by whitespace, commas,
//! or both. An `EXPANDER <irq_pin>` directive enables the port expander,
//! after which `A<bit>`/`B<bit>` tokens address its bank bits.
//!
//! Parsing is deliberately forgiving: an unknown keyword or malformed pin
//! token is logged and skipped while every other directive still applies,
//! and a missing file leaves the current configuration untouched.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use evdev::Key;
use log::{info, warn};

use crate::constants::COMBO_HOLD_TIME;
use crate::keycode_db::KeycodeDb;
use crate::models::{
    Bank, ComboMask, Configuration, ExpanderConfig, InputLine, LineMapping, PinId,
};

/// Reads and parses the directive file.
///
/// Returns `None` when the file is missing or unreadable; the caller keeps
/// whatever configuration it already has (empty on first load).
pub fn load(path: &Path, db: &KeycodeDb, aliases: &[(u8, u8)]) -> Option<Configuration> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(parse(&content, db, aliases)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("config file {} not found; keeping current mapping", path.display());
            None
        }
        Err(err) => {
            warn!("can't read config file {}: {err}", path.display());
            None
        }
    }
}

/// Parses directive text into a [`Configuration`].
///
/// `aliases` is the board-revision pin remap, applied as a pure post-parse
/// step so old wiring lists keep working on early boards.
#[must_use]
pub fn parse(content: &str, db: &KeycodeDb, aliases: &[(u8, u8)]) -> Configuration {
    let mut builder = Builder::default();

    for (idx, raw) in content.lines().enumerate() {
        let lineno = idx + 1;
        let text = raw.split('#').next().unwrap_or("");
        let mut tokens = text.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        let pins = parse_pin_list(tokens, lineno);

        if keyword.eq_ignore_ascii_case("GND") {
            builder.ground(&pins, lineno);
        } else if keyword.eq_ignore_ascii_case("EXPANDER") {
            builder.expander(&pins, lineno);
        } else if let Some(key) = db.resolve(keyword) {
            builder.mapping(key, &pins, lineno);
        } else {
            warn!("config line {lineno}: unknown keyword '{keyword}', line skipped");
        }
    }

    builder.finish(aliases)
}

/// Parses the pin tokens of one directive, logging and skipping bad ones.
fn parse_pin_list<'a>(tokens: impl Iterator<Item = &'a str>, lineno: usize) -> Vec<PinId> {
    let mut pins = Vec::new();
    for token in tokens {
        for piece in token.split(',').filter(|p| !p.is_empty()) {
            match parse_pin_token(piece) {
                Some(pin) => pins.push(pin),
                None => warn!("config line {lineno}: bad pin token '{piece}', skipped"),
            }
        }
    }
    pins
}

/// Parses one pin token: a GPIO number in `[0,31]` or an expander bank bit
/// (`A0`-`A7`, `B0`-`B7`).
fn parse_pin_token(piece: &str) -> Option<PinId> {
    let bank = match piece.chars().next() {
        Some('A' | 'a') => Some(Bank::A),
        Some('B' | 'b') => Some(Bank::B),
        _ => None,
    };
    if let Some(bank) = bank {
        let bit: u8 = piece[1..].parse().ok()?;
        return (bit <= 7).then_some(PinId::Expander { bank, bit });
    }
    let pin: u8 = piece.parse().ok()?;
    (pin <= 31).then_some(PinId::Gpio(pin))
}

/// Accumulates directives in order, then resolves them into a configuration.
#[derive(Default)]
struct Builder {
    /// Pins in first-reference order.
    order: Vec<PinId>,
    map: HashMap<PinId, LineMapping>,
    combo: Option<(Vec<PinId>, Key)>,
    expander_irq: Option<u8>,
}

impl Builder {
    fn touch(&mut self, pin: PinId) {
        if !self.map.contains_key(&pin) {
            self.order.push(pin);
        }
    }

    fn set_mapping(&mut self, pin: PinId, mapping: LineMapping, lineno: usize) {
        self.touch(pin);
        if let Some(prev) = self.map.insert(pin, mapping) {
            if prev != mapping {
                warn!("config line {lineno}: pin {pin} remapped");
            }
        }
    }

    /// `<KEYNAME>` directive: one pin is a direct mapping, several register
    /// the combo.
    fn mapping(&mut self, key: Key, pins: &[PinId], lineno: usize) {
        match pins {
            [] => warn!("config line {lineno}: directive has no usable pins"),
            [pin] => self.set_mapping(*pin, LineMapping::Key(key), lineno),
            _ => {
                if self.combo.is_some() {
                    info!("config line {lineno}: combo replaced");
                }
                for pin in pins {
                    self.touch(*pin);
                    self.map.entry(*pin).or_insert(LineMapping::ComboOnly);
                }
                self.combo = Some((pins.to_vec(), key));
            }
        }
    }

    /// `GND` directive: pins become driven grounds and leave the combo.
    fn ground(&mut self, pins: &[PinId], lineno: usize) {
        if pins.is_empty() {
            warn!("config line {lineno}: GND directive has no usable pins");
        }
        for pin in pins {
            if pin.as_gpio().is_none() {
                warn!("config line {lineno}: expander pin {pin} can't be a ground, skipped");
                continue;
            }
            self.set_mapping(*pin, LineMapping::Ground, lineno);
            self.remove_from_combo(*pin, lineno);
        }
    }

    /// `EXPANDER <irq_pin>` directive.
    fn expander(&mut self, pins: &[PinId], lineno: usize) {
        let mut pins = pins.iter();
        match pins.next().copied().and_then(PinId::as_gpio) {
            Some(irq) => {
                if self.expander_irq.replace(irq).is_some() {
                    warn!("config line {lineno}: EXPANDER redeclared, IRQ pin now {irq}");
                }
            }
            None => warn!("config line {lineno}: EXPANDER needs a header GPIO IRQ pin"),
        }
        for extra in pins {
            warn!("config line {lineno}: extra EXPANDER token '{extra}' skipped");
        }
    }

    fn remove_from_combo(&mut self, pin: PinId, lineno: usize) {
        if let Some((members, _)) = &mut self.combo {
            let before = members.len();
            members.retain(|member| *member != pin);
            if members.len() < before && members.len() < 2 {
                warn!("config line {lineno}: combo dropped, fewer than two pins remain");
                self.combo = None;
            }
        }
    }

    fn finish(mut self, aliases: &[(u8, u8)]) -> Configuration {
        let expander_enabled = self.expander_irq.is_some();

        // Expander pins referenced without an EXPANDER directive are dead.
        if !expander_enabled {
            for pin in &self.order {
                if pin.as_gpio().is_none() {
                    warn!("expander pin {pin} used without EXPANDER directive, dropped");
                }
            }
            self.order.retain(|pin| pin.as_gpio().is_some());
        }

        let lines: Vec<InputLine> = self
            .order
            .iter()
            .map(|pin| InputLine {
                pin: remap(*pin, aliases),
                mapping: self.map[pin],
            })
            .collect();

        let combo = self.combo.and_then(|(members, target_key)| {
            let mut mask = 0u64;
            for member in members {
                if !expander_enabled && member.as_gpio().is_none() {
                    continue;
                }
                if self.map.get(&member) == Some(&LineMapping::Ground) {
                    warn!("combo pin {member} is a ground, dropped from combo");
                    continue;
                }
                mask |= remap(member, aliases).mask_bit();
            }
            // Duplicate pin tokens collapse in the mask, so count bits.
            if mask.count_ones() < 2 {
                warn!("combo dropped, fewer than two usable pins");
                return None;
            }
            Some(ComboMask { pins: mask, target_key, hold: COMBO_HOLD_TIME })
        });

        let expander = self.expander_irq.map(|irq_pin| ExpanderConfig {
            irq_pin: remap_gpio(irq_pin, aliases),
        });

        Configuration {
            lines,
            combo,
            expander,
            ..Configuration::empty()
        }
    }
}

/// Applies the board-revision alias table to one pin.
fn remap(pin: PinId, aliases: &[(u8, u8)]) -> PinId {
    match pin {
        PinId::Gpio(n) => PinId::Gpio(remap_gpio(n, aliases)),
        expander @ PinId::Expander { .. } => expander,
    }
}

fn remap_gpio(pin: u8, aliases: &[(u8, u8)]) -> u8 {
    aliases
        .iter()
        .find(|(from, _)| *from == pin)
        .map_or(pin, |(_, to)| *to)
}
