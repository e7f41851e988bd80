//! Shared helpers for the integration suites.

#![allow(dead_code)]

use gpiokeyd::engine::state::{Engine, KeyAction};
use gpiokeyd::engine::Event;
use gpiokeyd::keycode_db::KeycodeDb;
use gpiokeyd::models::Configuration;
use gpiokeyd::parser;

/// Parses directive text with the standard key table and no pin aliasing.
pub fn parse(content: &str) -> Configuration {
    parser::parse(content, &KeycodeDb::new(), &[])
}

/// A realistic cabinet config: joystick, six buttons, select/start, a spare
/// ground, and an exit combo on the select+start pins.
pub fn cabinet_config() -> &'static str {
    "\
# arcade cabinet wiring
LEFT 4
RIGHT 19
UP 16
DOWN 26
LEFTCTRL 14   # A button
LEFTALT 15    # B button
Z 20
X 18
SPACE 5       # select
ENTER 6       # start
GND 21
ESC 5 6       # hold select+start to exit
"
}

/// An engine for `cfg` with every line starting released.
pub fn engine(cfg: &Configuration) -> Engine {
    let count = cfg.input_lines().count();
    Engine::new(cfg, &vec![false; count])
}

/// Raw level change on one line.
pub fn touch(engine: &mut Engine, line: usize, pressed: bool) {
    engine.handle(Event::LineChanged { line, pressed });
}

/// Level change followed by an expired debounce window; returns what got
/// emitted.
pub fn settle(engine: &mut Engine, line: usize, pressed: bool) -> Vec<KeyAction> {
    touch(engine, line, pressed);
    engine.handle(Event::DebounceElapsed).actions
}
