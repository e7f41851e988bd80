//! The debounce/repeat/combo state machine.
//!
//! Pure state: events in, key actions out, no I/O. The multiplexer feeds it
//! level changes and elapsed timeouts; it answers with the key events to
//! emit and, through [`Engine::wait`], the single timeout class the next
//! blocking wait should use.
//!
//! Per line, the machine tracks three levels: `raw` (last read from the
//! descriptor), `debounced` (trusted after a full stable window), and
//! `emitted` (what the virtual keyboard last saw). `debounced` only ever
//! changes when the debounce window expires, so any number of bounces
//! inside the window collapse into at most one emitted event.

use std::time::Duration;

use evdev::Key;

use super::Event;
use crate::constants::{REPEAT_ACCEL, REPEAT_FLOOR};
use crate::keyboard::KeyValue;
use crate::models::{ComboMask, Configuration, PinId};

/// One key event the engine wants emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAction {
    /// Key code to emit.
    pub key: Key,
    /// Press, release, or repeat.
    pub value: KeyValue,
}

/// The single timeout class live at any instant, in priority order:
/// debounce beats combo-hold beats repeat beats idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Nothing pending: block indefinitely.
    Idle,
    /// A raw level changed; wait out the debounce window.
    Debounce(Duration),
    /// The combo's full pin set is held; wait out the hold duration.
    ComboHold(Duration),
    /// A key is held; wait for the next repeat.
    Repeat(Duration),
}

/// What one dispatched event produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// Ordinary key events, in configuration line order.
    pub actions: Vec<KeyAction>,
    /// Set when the combo completed its hold; the runtime synthesizes the
    /// press+release pair with its required pacing.
    pub combo_fired: Option<Key>,
}

/// Runtime level state of one readable line.
#[derive(Debug)]
struct LineState {
    pin: PinId,
    key: Option<Key>,
    raw: bool,
    debounced: bool,
    emitted: bool,
}

/// The state machine itself. Built from a configuration plus the initial
/// captured levels; destroyed wholesale on unload.
#[derive(Debug)]
pub struct Engine {
    lines: Vec<LineState>,
    combo: Option<ComboMask>,
    debounce: Duration,
    repeat_delay: Duration,
    repeat_interval: Duration,
    /// Debounced pressed lines, by [`PinId::mask_bit`] position.
    pressed_mask: u64,
    /// A raw change is waiting for its debounce window.
    raw_pending: bool,
    /// Line index of the most recent press, while it stays held.
    held: Option<usize>,
    /// Delay before the next repeat fires.
    next_repeat: Duration,
    wait: Wait,
}

impl Engine {
    /// Builds the machine. `initial` carries the pressed level captured for
    /// each readable line during pin activation; initial levels seed all
    /// three per-line states, so a button held across a load produces no
    /// phantom press.
    #[must_use]
    pub fn new(cfg: &Configuration, initial: &[bool]) -> Self {
        let lines: Vec<LineState> = cfg
            .input_lines()
            .enumerate()
            .map(|(idx, line)| {
                let level = initial.get(idx).copied().unwrap_or(false);
                LineState {
                    pin: line.pin,
                    key: line.key(),
                    raw: level,
                    debounced: level,
                    emitted: level,
                }
            })
            .collect();
        let pressed_mask = lines
            .iter()
            .filter(|line| line.debounced)
            .fold(0, |mask, line| mask | line.pin.mask_bit());
        Self {
            lines,
            combo: cfg.combo,
            debounce: cfg.debounce_time,
            repeat_delay: cfg.repeat_delay,
            repeat_interval: cfg.repeat_interval,
            pressed_mask,
            raw_pending: false,
            held: None,
            next_repeat: cfg.repeat_delay,
            wait: Wait::Idle,
        }
    }

    /// The timeout class the next blocking wait should use.
    #[must_use]
    pub fn wait(&self) -> Wait {
        self.wait
    }

    /// Number of readable lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Dispatches one event. Control variants are consumed by the reload
    /// controller before they reach the engine and are no-ops here.
    pub fn handle(&mut self, event: Event) -> Step {
        match event {
            Event::LineChanged { line, pressed } => {
                self.note_level(line, pressed);
                Step::default()
            }
            Event::DebounceElapsed => Step {
                actions: self.reconcile(),
                combo_fired: None,
            },
            Event::ComboElapsed => Step {
                actions: Vec::new(),
                combo_fired: self.combo_elapsed(),
            },
            Event::RepeatElapsed => Step {
                actions: self.repeat_elapsed().into_iter().collect(),
                combo_fired: None,
            },
            Event::ReloadRequested | Event::Shutdown => Step::default(),
        }
    }

    /// Records a raw level and arms the debounce window. Nothing is
    /// emitted until the window expires.
    fn note_level(&mut self, line: usize, pressed: bool) {
        let Some(state) = self.lines.get_mut(line) else {
            return;
        };
        state.raw = pressed;
        self.raw_pending = true;
        self.wait = Wait::Debounce(self.debounce);
    }

    /// Debounce window expired: trust the raw levels, emit one event per
    /// line whose level genuinely changed since it was last emitted, and
    /// rebuild the combo bitmask. Bounces that settled back produce
    /// nothing.
    fn reconcile(&mut self) -> Vec<KeyAction> {
        let mut actions = Vec::new();
        for (idx, line) in self.lines.iter_mut().enumerate() {
            if line.raw != line.emitted {
                line.emitted = line.raw;
                if let Some(key) = line.key {
                    let value = if line.raw { KeyValue::Press } else { KeyValue::Release };
                    actions.push(KeyAction { key, value });
                }
                if line.raw {
                    if line.key.is_some() {
                        self.held = Some(idx);
                        self.next_repeat = self.repeat_delay;
                    }
                } else {
                    // Any release stops the repeat.
                    self.held = None;
                }
            }
            line.debounced = line.raw;
        }
        self.raw_pending = false;
        self.pressed_mask = self
            .lines
            .iter()
            .filter(|line| line.debounced)
            .fold(0, |mask, line| mask | line.pin.mask_bit());
        self.wait = self.steady_wait();
        actions
    }

    /// Combo hold completed. Fires only if the full set is still held;
    /// afterwards the machine returns fully to idle, so the combo re-arms
    /// only once its membership changes again.
    fn combo_elapsed(&mut self) -> Option<Key> {
        if let Some(combo) = self.combo {
            if combo.covered_by(self.pressed_mask) {
                self.held = None;
                self.wait = Wait::Idle;
                return Some(combo.target_key);
            }
        }
        self.wait = self.steady_wait();
        None
    }

    /// Repeat interval completed: resend the held key and accelerate. The
    /// first firing comes after the initial delay, the second after the
    /// base interval, and each one after that shaves a fixed step off down
    /// to the floor.
    fn repeat_elapsed(&mut self) -> Option<KeyAction> {
        let key = self
            .held
            .and_then(|idx| self.lines.get(idx))
            .and_then(|line| line.key);
        let Some(key) = key else {
            self.wait = self.steady_wait();
            return None;
        };
        self.next_repeat = if self.next_repeat == self.repeat_delay {
            self.repeat_interval
        } else {
            self.next_repeat.saturating_sub(REPEAT_ACCEL).max(REPEAT_FLOOR)
        };
        self.wait = Wait::Repeat(self.next_repeat);
        Some(KeyAction { key, value: KeyValue::Repeat })
    }

    /// The wait class once no raw change is pending, by priority.
    fn steady_wait(&self) -> Wait {
        if self.raw_pending {
            return Wait::Debounce(self.debounce);
        }
        if let Some(combo) = self.combo {
            if combo.covered_by(self.pressed_mask) {
                return Wait::ComboHold(combo.hold);
            }
        }
        if self.held.is_some() {
            return Wait::Repeat(self.next_repeat);
        }
        Wait::Idle
    }
}
