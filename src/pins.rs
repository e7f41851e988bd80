//! Pin configuration manager.
//!
//! Turns a loaded [`Configuration`] into live OS resources: pull-ups
//! asserted, lines exported and configured, value fds opened, the port
//! expander set up. Activation is all-or-nothing — any failure tears down
//! whatever was configured so far and propagates, which the daemon treats
//! as fatal. Teardown itself is best-effort and never fails.

use std::fs::File;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::constants::{EXPANDER_ADDR, EXPANDER_BUS};
use crate::gpio::expander::{self, Mcp23017};
use crate::gpio::pullup::{self, PullRegisters};
use crate::gpio::sysfs::{self, SysfsGpio};
use crate::models::{Configuration, PinId};

/// The expander's live handles: the chip itself and the exported GPIO line
/// its INT output is wired to.
struct ExpanderIo {
    chip: Mcp23017,
    irq_fd: File,
}

/// Live pin resources for one loaded configuration.
pub struct ActivePins {
    gpio: SysfsGpio,
    exported: Vec<u8>,
    grounds: Vec<u8>,
    pullup_mask: u32,
    /// `(input-line index, value fd)` per readable GPIO line, in
    /// configuration order.
    line_fds: Vec<(usize, File)>,
    expander: Option<ExpanderIo>,
}

impl ActivePins {
    /// Activates every line of `cfg`. Returns the live resources plus the
    /// captured initial pressed level of each readable line (indexed like
    /// [`Configuration::input_lines`]).
    pub fn activate(
        cfg: &Configuration,
        gpio: SysfsGpio,
        regs: &mut dyn PullRegisters,
    ) -> Result<(Self, Vec<bool>)> {
        let mut pins = Self {
            gpio,
            exported: Vec::new(),
            grounds: Vec::new(),
            pullup_mask: 0,
            line_fds: Vec::new(),
            expander: None,
        };
        match pins.configure(cfg, regs) {
            Ok(levels) => Ok((pins, levels)),
            Err(err) => {
                pins.teardown(regs);
                Err(err)
            }
        }
    }

    fn configure(
        &mut self,
        cfg: &Configuration,
        regs: &mut dyn PullRegisters,
    ) -> Result<Vec<bool>> {
        self.pullup_mask = cfg.pullup_mask();
        if self.pullup_mask != 0 {
            pullup::enable(regs, self.pullup_mask);
        }

        let mut levels = Vec::new();
        let mut line_index = 0usize;
        for line in &cfg.lines {
            match line.pin {
                PinId::Gpio(pin) => {
                    self.gpio.export(pin)?;
                    self.exported.push(pin);
                    self.gpio.write_attr(pin, "active_low", "0")?;
                    if line.is_ground() {
                        self.gpio.write_attr(pin, "direction", "out")?;
                        self.gpio.write_attr(pin, "value", "0")?;
                        self.grounds.push(pin);
                    } else {
                        self.gpio.write_attr(pin, "direction", "in")?;
                        self.gpio.write_attr(pin, "edge", "both")?;
                        let file = self.gpio.open_value(pin)?;
                        let pressed = sysfs::read_pressed(&file)
                            .with_context(|| format!("can't read initial level of pin {pin}"))?
                            .unwrap_or(false);
                        levels.push(pressed);
                        self.line_fds.push((line_index, file));
                        line_index += 1;
                    }
                }
                PinId::Expander { .. } => {
                    // Level captured from the bank read once the chip is up.
                    levels.push(false);
                    line_index += 1;
                }
            }
        }

        if let Some(xcfg) = &cfg.expander {
            let irq = xcfg.irq_pin;
            self.gpio.export(irq)?;
            self.exported.push(irq);
            self.gpio.write_attr(irq, "active_low", "0")?;
            self.gpio.write_attr(irq, "direction", "in")?;
            self.gpio.write_attr(irq, "edge", "falling")?;
            let irq_fd = self.gpio.open_value(irq)?;
            // Prime the fd so the first edge is reported as an exception.
            let _ = sysfs::read_pressed(&irq_fd);

            let mut chip = Mcp23017::open(EXPANDER_BUS, EXPANDER_ADDR)
                .with_context(|| format!("can't open expander on {EXPANDER_BUS}"))?;
            chip.configure().context("can't configure expander")?;
            let banks = chip.read_banks().context("can't read expander banks")?;
            for (idx, line) in cfg.input_lines().enumerate() {
                if let PinId::Expander { bank, bit } = line.pin {
                    levels[idx] = expander::pressed(banks, bank, bit);
                }
            }
            self.expander = Some(ExpanderIo { chip, irq_fd });
        }

        Ok(levels)
    }

    /// Releases everything: value fds, expander handles, ground pins back
    /// to inputs, exports removed, pull-ups released. Errors are ignored —
    /// pins may be partially initialized.
    pub fn teardown(&mut self, regs: &mut dyn PullRegisters) {
        self.line_fds.clear();
        self.expander = None;

        for pin in self.grounds.drain(..) {
            self.gpio.write_attr_quiet(pin, "direction", "in");
        }
        for pin in self.exported.drain(..) {
            self.gpio.unexport(pin);
        }
        if self.pullup_mask != 0 {
            pullup::disable(regs, self.pullup_mask);
            self.pullup_mask = 0;
        }
        debug!("pin resources released");
    }

    /// The readable GPIO lines: `(input-line index, value fd)`.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &File)> {
        self.line_fds.iter().map(|(idx, file)| (*idx, file))
    }

    /// The expander IRQ fd, when an expander is attached.
    #[must_use]
    pub fn irq_fd(&self) -> Option<&File> {
        self.expander.as_ref().map(|x| &x.irq_fd)
    }

    /// Acknowledges an expander interrupt and reads both banks. `None` when
    /// no expander is attached; a bus error is surfaced for the caller to
    /// absorb (a wedged expander should not kill the daemon).
    pub fn read_expander_banks(&mut self) -> Option<u16> {
        let x = self.expander.as_mut()?;
        let _ = sysfs::read_pressed(&x.irq_fd);
        match x.chip.read_banks() {
            Ok(banks) => Some(banks),
            Err(err) => {
                warn!("expander bank read failed: {err}");
                None
            }
        }
    }
}
