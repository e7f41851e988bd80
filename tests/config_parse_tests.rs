//! Integration tests for directive-file parsing.

use std::io::Write;

use evdev::Key;
use gpiokeyd::keycode_db::KeycodeDb;
use gpiokeyd::models::{Bank, LineMapping, PinId};
use gpiokeyd::parser;

mod fixtures;
use fixtures::*;

#[test]
fn full_cabinet_config_parses() {
    let cfg = parse(cabinet_config());

    // 11 directives reference pins; the combo reuses already-mapped pins.
    assert_eq!(cfg.lines.len(), 11);
    assert_eq!(cfg.input_lines().count(), 10);

    let left = &cfg.lines[0];
    assert_eq!(left.pin, PinId::Gpio(4));
    assert_eq!(left.mapping, LineMapping::Key(Key::KEY_LEFT));

    let ground = cfg.lines.iter().find(|l| l.is_ground()).unwrap();
    assert_eq!(ground.pin, PinId::Gpio(21));

    let combo = cfg.combo.unwrap();
    assert_eq!(combo.target_key, Key::KEY_ESC);
    assert_eq!(combo.pins, PinId::Gpio(5).mask_bit() | PinId::Gpio(6).mask_bit());
}

#[test]
fn out_of_range_pin_is_skipped_but_line_survives() {
    // 99 is out of range; the other token of the same directive and the
    // following directive still apply.
    let cfg = parse("Z 99 20\nX 18\n");
    assert_eq!(cfg.lines.len(), 2);
    assert_eq!(cfg.lines[0].pin, PinId::Gpio(20));
    assert_eq!(cfg.lines[0].mapping, LineMapping::Key(Key::KEY_Z));
    assert_eq!(cfg.lines[1].pin, PinId::Gpio(18));
}

#[test]
fn unknown_keyword_skips_only_its_line() {
    let cfg = parse("FROB 4\nLEFT 4\n");
    assert_eq!(cfg.lines.len(), 1);
    assert_eq!(cfg.lines[0].mapping, LineMapping::Key(Key::KEY_LEFT));
}

#[test]
fn malformed_tokens_do_not_abort_the_load() {
    let cfg = parse("LEFT abc\nRIGHT 19\nUP -3\nDOWN 26\n");
    let pins: Vec<PinId> = cfg.lines.iter().map(|l| l.pin).collect();
    assert_eq!(pins, vec![PinId::Gpio(19), PinId::Gpio(26)]);
}

#[test]
fn later_directive_remaps_a_pin_in_place() {
    let cfg = parse("LEFT 4\nRIGHT 19\nZ 4\n");
    // Pin 4 keeps its first position but takes the last mapping.
    assert_eq!(cfg.lines.len(), 2);
    assert_eq!(cfg.lines[0].pin, PinId::Gpio(4));
    assert_eq!(cfg.lines[0].mapping, LineMapping::Key(Key::KEY_Z));
}

#[test]
fn multi_pin_directive_registers_the_combo() {
    let cfg = parse("ESC 23 18\n");
    let combo = cfg.combo.unwrap();
    assert_eq!(combo.pins, PinId::Gpio(23).mask_bit() | PinId::Gpio(18).mask_bit());
    // Pins referenced only by the combo become readable combo-only lines.
    assert_eq!(cfg.lines.len(), 2);
    assert!(cfg
        .lines
        .iter()
        .all(|l| l.mapping == LineMapping::ComboOnly));
}

#[test]
fn a_second_combo_overwrites_the_first() {
    let cfg = parse("ESC 23 18\nENTER 5 6\n");
    let combo = cfg.combo.unwrap();
    assert_eq!(combo.target_key, Key::KEY_ENTER);
    assert_eq!(combo.pins, PinId::Gpio(5).mask_bit() | PinId::Gpio(6).mask_bit());
}

#[test]
fn gnd_removes_pins_from_the_combo() {
    // Grounding one of two combo pins leaves fewer than two members, so
    // the combo is dropped entirely.
    let cfg = parse("ESC 23 18\nGND 23\n");
    assert!(cfg.combo.is_none());
    let ground = cfg.lines.iter().find(|l| l.pin == PinId::Gpio(23)).unwrap();
    assert!(ground.is_ground());
}

#[test]
fn gnd_leaves_a_three_pin_combo_alive() {
    let cfg = parse("ESC 23 18 24\nGND 24\n");
    let combo = cfg.combo.unwrap();
    assert_eq!(combo.pins, PinId::Gpio(23).mask_bit() | PinId::Gpio(18).mask_bit());
}

#[test]
fn combo_reduced_to_one_pin_by_bad_tokens_is_a_direct_mapping() {
    // Token-level skipping happens before the one-vs-many rule.
    let cfg = parse("ESC 23 99\n");
    assert!(cfg.combo.is_none());
    assert_eq!(cfg.lines[0].mapping, LineMapping::Key(Key::KEY_ESC));
}

#[test]
fn reparsing_identical_text_is_idempotent() {
    let first = parse(cabinet_config());
    let second = parse(cabinet_config());
    assert_eq!(first, second);
}

#[test]
fn missing_file_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let db = KeycodeDb::new();
    assert!(parser::load(&dir.path().join("nope.cfg"), &db, &[]).is_none());
}

#[test]
fn load_reads_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cabinet.cfg");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(cabinet_config().as_bytes()).unwrap();

    let db = KeycodeDb::new();
    let cfg = parser::load(&path, &db, &[]).unwrap();
    assert_eq!(cfg, parse(cabinet_config()));
}

#[test]
fn expander_directive_enables_bank_tokens() {
    let cfg = parse("EXPANDER 17\nLEFT A0\nRIGHT A2\nZ B5\n");
    assert_eq!(cfg.expander.unwrap().irq_pin, 17);
    let pins: Vec<PinId> = cfg.lines.iter().map(|l| l.pin).collect();
    assert_eq!(
        pins,
        vec![
            PinId::Expander { bank: Bank::A, bit: 0 },
            PinId::Expander { bank: Bank::A, bit: 2 },
            PinId::Expander { bank: Bank::B, bit: 5 },
        ]
    );
}

#[test]
fn bank_tokens_without_expander_directive_are_dropped() {
    let cfg = parse("LEFT A0\nRIGHT 19\n");
    assert!(cfg.expander.is_none());
    assert_eq!(cfg.lines.len(), 1);
    assert_eq!(cfg.lines[0].pin, PinId::Gpio(19));
}

#[test]
fn expander_pins_cannot_be_grounds() {
    let cfg = parse("EXPANDER 17\nLEFT A0\nGND A0\n");
    let line = &cfg.lines[0];
    assert_eq!(line.pin, PinId::Expander { bank: Bank::A, bit: 0 });
    assert_eq!(line.mapping, LineMapping::Key(Key::KEY_LEFT));
}

#[test]
fn combo_can_span_expander_and_gpio_pins() {
    let cfg = parse("EXPANDER 17\nSPACE A4\nENTER 6\nESC A4 6\n");
    let combo = cfg.combo.unwrap();
    let a4 = PinId::Expander { bank: Bank::A, bit: 4 };
    assert_eq!(combo.pins, a4.mask_bit() | PinId::Gpio(6).mask_bit());
}

#[test]
fn comma_separated_pin_lists_work() {
    let cfg = parse("GND 21,22,23\n");
    assert_eq!(cfg.lines.len(), 3);
    assert!(cfg.lines.iter().all(gpiokeyd::models::InputLine::is_ground));
}
