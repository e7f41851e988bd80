//! Integration tests for the debounce/repeat/combo engine.

use std::time::Duration;

use evdev::Key;
use gpiokeyd::constants::{COMBO_HOLD_TIME, REPEAT_DELAY, REPEAT_FLOOR, REPEAT_INTERVAL};
use gpiokeyd::engine::state::{Engine, KeyAction, Wait};
use gpiokeyd::engine::Event;
use gpiokeyd::keyboard::KeyValue;

mod fixtures;
use fixtures::*;

/// Simple two-button configuration, no combo.
fn two_buttons() -> gpiokeyd::models::Configuration {
    parse("LEFT 4\nRIGHT 19\n")
}

/// Buttons plus a select+start exit combo.
fn combo_setup() -> gpiokeyd::models::Configuration {
    parse("SPACE 5\nENTER 6\nESC 5 6\n")
}

#[test]
fn one_transition_emits_exactly_one_event() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);

    let actions = settle(&mut engine, 0, true);
    assert_eq!(
        actions,
        vec![KeyAction { key: Key::KEY_LEFT, value: KeyValue::Press }]
    );

    let actions = settle(&mut engine, 0, false);
    assert_eq!(
        actions,
        vec![KeyAction { key: Key::KEY_LEFT, value: KeyValue::Release }]
    );
}

#[test]
fn line_change_arms_the_debounce_window() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);
    assert_eq!(engine.wait(), Wait::Idle);

    touch(&mut engine, 0, true);
    assert_eq!(engine.wait(), Wait::Debounce(cfg.debounce_time));
}

#[test]
fn bounces_inside_the_window_collapse_to_one_event() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);

    // Contact chatter: down-up-down before the window expires.
    touch(&mut engine, 0, true);
    touch(&mut engine, 0, false);
    touch(&mut engine, 0, true);
    let actions = engine.handle(Event::DebounceElapsed).actions;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].value, KeyValue::Press);
}

#[test]
fn bounce_that_settles_back_emits_nothing() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);

    // A glitch that returns to the released level before the window ends:
    // no press, and especially no press-then-release pair.
    touch(&mut engine, 0, true);
    touch(&mut engine, 0, false);
    let actions = engine.handle(Event::DebounceElapsed).actions;
    assert!(actions.is_empty());
    assert_eq!(engine.wait(), Wait::Idle);
}

#[test]
fn events_preserve_configuration_line_order() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);

    touch(&mut engine, 1, true);
    touch(&mut engine, 0, true);
    let actions = engine.handle(Event::DebounceElapsed).actions;
    let keys: Vec<Key> = actions.iter().map(|a| a.key).collect();
    assert_eq!(keys, vec![Key::KEY_LEFT, Key::KEY_RIGHT]);
}

#[test]
fn press_arms_repeat_at_the_initial_delay() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);

    settle(&mut engine, 0, true);
    assert_eq!(engine.wait(), Wait::Repeat(REPEAT_DELAY));
}

#[test]
fn repeats_accelerate_down_to_the_floor() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);
    settle(&mut engine, 0, true);

    // First repeat fires after the initial delay and emits value=2.
    let step = engine.handle(Event::RepeatElapsed);
    assert_eq!(
        step.actions,
        vec![KeyAction { key: Key::KEY_LEFT, value: KeyValue::Repeat }]
    );
    assert_eq!(engine.wait(), Wait::Repeat(REPEAT_INTERVAL));

    // Intervals then shrink monotonically and stick at the floor.
    let mut last = REPEAT_INTERVAL;
    for _ in 0..32 {
        let step = engine.handle(Event::RepeatElapsed);
        assert_eq!(step.actions.len(), 1);
        let Wait::Repeat(next) = engine.wait() else {
            panic!("repeat wait expected");
        };
        assert!(next <= last);
        assert!(next >= REPEAT_FLOOR);
        last = next;
    }
    assert_eq!(last, REPEAT_FLOOR);
}

#[test]
fn release_stops_repeats_immediately() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);
    settle(&mut engine, 0, true);
    engine.handle(Event::RepeatElapsed);

    settle(&mut engine, 0, false);
    assert_eq!(engine.wait(), Wait::Idle);
}

#[test]
fn releasing_any_key_cancels_a_running_repeat() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);
    settle(&mut engine, 0, true);
    settle(&mut engine, 1, true);
    // Releasing the second button stops the repeat of the first too.
    settle(&mut engine, 1, false);
    assert_eq!(engine.wait(), Wait::Idle);
}

#[test]
fn full_combo_hold_fires_once_and_returns_to_idle() {
    let cfg = combo_setup();
    let mut engine = engine(&cfg);

    settle(&mut engine, 0, true);
    settle(&mut engine, 1, true);
    assert_eq!(engine.wait(), Wait::ComboHold(COMBO_HOLD_TIME));

    let step = engine.handle(Event::ComboElapsed);
    assert_eq!(step.combo_fired, Some(Key::KEY_ESC));
    assert!(step.actions.is_empty());
    assert_eq!(engine.wait(), Wait::Idle);
}

#[test]
fn combo_needs_the_full_hold_again_after_release() {
    let cfg = combo_setup();
    let mut engine = engine(&cfg);

    settle(&mut engine, 0, true);
    settle(&mut engine, 1, true);
    engine.handle(Event::ComboElapsed);

    // Release one member, press it again: the hold starts over at the full
    // duration instead of firing early.
    settle(&mut engine, 1, false);
    settle(&mut engine, 1, true);
    assert_eq!(engine.wait(), Wait::ComboHold(COMBO_HOLD_TIME));
}

#[test]
fn breaking_the_combo_resets_it() {
    let cfg = combo_setup();
    let mut engine = engine(&cfg);

    settle(&mut engine, 0, true);
    settle(&mut engine, 1, true);
    settle(&mut engine, 1, false);

    // The stale hold timeout must not fire once a member released.
    let step = engine.handle(Event::ComboElapsed);
    assert_eq!(step.combo_fired, None);
}

#[test]
fn combo_hold_outranks_key_repeat() {
    let cfg = combo_setup();
    let mut engine = engine(&cfg);

    settle(&mut engine, 0, true);
    assert_eq!(engine.wait(), Wait::Repeat(REPEAT_DELAY));

    settle(&mut engine, 1, true);
    // Both members held: the combo hold takes over even though a key
    // repeat is also conceptually pending.
    assert_eq!(engine.wait(), Wait::ComboHold(COMBO_HOLD_TIME));
}

#[test]
fn combo_only_lines_emit_no_key_events() {
    let cfg = parse("ESC 23 18\n");
    let mut engine = engine(&cfg);

    let actions = settle(&mut engine, 0, true);
    assert!(actions.is_empty());
    let actions = settle(&mut engine, 1, true);
    assert!(actions.is_empty());
    assert_eq!(engine.wait(), Wait::ComboHold(COMBO_HOLD_TIME));
}

#[test]
fn initial_levels_produce_no_phantom_events() {
    let cfg = two_buttons();
    // Button held while the configuration loads.
    let mut engine = Engine::new(&cfg, &[true, false]);

    touch(&mut engine, 0, true);
    let actions = engine.handle(Event::DebounceElapsed).actions;
    assert!(actions.is_empty());

    // The first real transition is the release.
    let actions = settle(&mut engine, 0, false);
    assert_eq!(
        actions,
        vec![KeyAction { key: Key::KEY_LEFT, value: KeyValue::Release }]
    );
}

#[test]
fn out_of_range_line_indices_are_ignored() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);
    assert_eq!(engine.line_count(), 2);

    // A stale index (e.g. an event raced with a reload) is a no-op.
    touch(&mut engine, 7, true);
    let actions = engine.handle(Event::DebounceElapsed).actions;
    assert!(actions.is_empty());
}

#[test]
fn repeat_interval_resets_on_a_new_press() {
    let cfg = two_buttons();
    let mut engine = engine(&cfg);

    settle(&mut engine, 0, true);
    for _ in 0..10 {
        engine.handle(Event::RepeatElapsed);
    }
    let Wait::Repeat(accelerated) = engine.wait() else {
        panic!("repeat wait expected");
    };
    assert!(accelerated < REPEAT_INTERVAL);

    // Pressing another key restarts at the initial delay.
    settle(&mut engine, 1, true);
    assert_eq!(engine.wait(), Wait::Repeat(REPEAT_DELAY));
}

#[test]
fn debounce_outranks_everything() {
    let cfg = combo_setup();
    let mut engine = engine(&cfg);

    settle(&mut engine, 0, true);
    settle(&mut engine, 1, true);
    assert_eq!(engine.wait(), Wait::ComboHold(COMBO_HOLD_TIME));

    // A fresh raw change immediately re-arms the debounce window.
    touch(&mut engine, 0, false);
    assert_eq!(engine.wait(), Wait::Debounce(Duration::from_millis(20)));
}
