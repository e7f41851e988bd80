//! Key-name database.
//!
//! Maps the key names used in config directives (the `KEY_*` names from
//! `<linux/input-event-codes.h>`, written without the prefix) to evdev key
//! codes, with O(1) lookup.

use std::collections::HashMap;

use evdev::Key;

/// Names accepted in directive files and the key codes they resolve to.
///
/// The set mirrors the keys the original arcade builds bind: the full
/// letter/digit/function rows, navigation, and the modifier cluster.
const KEY_TABLE: &[(&str, Key)] = &[
    // Letters
    ("A", Key::KEY_A),
    ("B", Key::KEY_B),
    ("C", Key::KEY_C),
    ("D", Key::KEY_D),
    ("E", Key::KEY_E),
    ("F", Key::KEY_F),
    ("G", Key::KEY_G),
    ("H", Key::KEY_H),
    ("I", Key::KEY_I),
    ("J", Key::KEY_J),
    ("K", Key::KEY_K),
    ("L", Key::KEY_L),
    ("M", Key::KEY_M),
    ("N", Key::KEY_N),
    ("O", Key::KEY_O),
    ("P", Key::KEY_P),
    ("Q", Key::KEY_Q),
    ("R", Key::KEY_R),
    ("S", Key::KEY_S),
    ("T", Key::KEY_T),
    ("U", Key::KEY_U),
    ("V", Key::KEY_V),
    ("W", Key::KEY_W),
    ("X", Key::KEY_X),
    ("Y", Key::KEY_Y),
    ("Z", Key::KEY_Z),
    // Digit row
    ("1", Key::KEY_1),
    ("2", Key::KEY_2),
    ("3", Key::KEY_3),
    ("4", Key::KEY_4),
    ("5", Key::KEY_5),
    ("6", Key::KEY_6),
    ("7", Key::KEY_7),
    ("8", Key::KEY_8),
    ("9", Key::KEY_9),
    ("0", Key::KEY_0),
    // Function row
    ("F1", Key::KEY_F1),
    ("F2", Key::KEY_F2),
    ("F3", Key::KEY_F3),
    ("F4", Key::KEY_F4),
    ("F5", Key::KEY_F5),
    ("F6", Key::KEY_F6),
    ("F7", Key::KEY_F7),
    ("F8", Key::KEY_F8),
    ("F9", Key::KEY_F9),
    ("F10", Key::KEY_F10),
    ("F11", Key::KEY_F11),
    ("F12", Key::KEY_F12),
    // Navigation
    ("LEFT", Key::KEY_LEFT),
    ("RIGHT", Key::KEY_RIGHT),
    ("UP", Key::KEY_UP),
    ("DOWN", Key::KEY_DOWN),
    ("HOME", Key::KEY_HOME),
    ("END", Key::KEY_END),
    ("PAGEUP", Key::KEY_PAGEUP),
    ("PAGEDOWN", Key::KEY_PAGEDOWN),
    ("INSERT", Key::KEY_INSERT),
    ("DELETE", Key::KEY_DELETE),
    // Modifiers
    ("LEFTCTRL", Key::KEY_LEFTCTRL),
    ("RIGHTCTRL", Key::KEY_RIGHTCTRL),
    ("LEFTSHIFT", Key::KEY_LEFTSHIFT),
    ("RIGHTSHIFT", Key::KEY_RIGHTSHIFT),
    ("LEFTALT", Key::KEY_LEFTALT),
    ("RIGHTALT", Key::KEY_RIGHTALT),
    ("LEFTMETA", Key::KEY_LEFTMETA),
    ("RIGHTMETA", Key::KEY_RIGHTMETA),
    // Whitespace and control
    ("SPACE", Key::KEY_SPACE),
    ("ENTER", Key::KEY_ENTER),
    ("ESC", Key::KEY_ESC),
    ("TAB", Key::KEY_TAB),
    ("BACKSPACE", Key::KEY_BACKSPACE),
    ("CAPSLOCK", Key::KEY_CAPSLOCK),
    // Punctuation
    ("MINUS", Key::KEY_MINUS),
    ("EQUAL", Key::KEY_EQUAL),
    ("LEFTBRACE", Key::KEY_LEFTBRACE),
    ("RIGHTBRACE", Key::KEY_RIGHTBRACE),
    ("SEMICOLON", Key::KEY_SEMICOLON),
    ("APOSTROPHE", Key::KEY_APOSTROPHE),
    ("GRAVE", Key::KEY_GRAVE),
    ("BACKSLASH", Key::KEY_BACKSLASH),
    ("COMMA", Key::KEY_COMMA),
    ("DOT", Key::KEY_DOT),
    ("SLASH", Key::KEY_SLASH),
];

/// Key-name lookup built over [`KEY_TABLE`].
#[derive(Debug, Clone)]
pub struct KeycodeDb {
    lookup: HashMap<&'static str, Key>,
}

impl KeycodeDb {
    /// Builds the lookup table.
    #[must_use]
    pub fn new() -> Self {
        let lookup = KEY_TABLE.iter().copied().collect();
        Self { lookup }
    }

    /// Resolves a directive key name to its key code.
    ///
    /// Matching is case-insensitive and tolerates an explicit `KEY_` prefix,
    /// so `LEFT`, `left` and `KEY_LEFT` all resolve to the same code.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Key> {
        let upper = name.to_ascii_uppercase();
        let bare = upper.strip_prefix("KEY_").unwrap_or(&upper);
        self.lookup.get(bare).copied()
    }
}

impl Default for KeycodeDb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plain_names() {
        let db = KeycodeDb::new();
        assert_eq!(db.resolve("LEFT"), Some(Key::KEY_LEFT));
        assert_eq!(db.resolve("Z"), Some(Key::KEY_Z));
        assert_eq!(db.resolve("5"), Some(Key::KEY_5));
    }

    #[test]
    fn resolves_prefixed_and_lowercase_names() {
        let db = KeycodeDb::new();
        assert_eq!(db.resolve("KEY_ESC"), Some(Key::KEY_ESC));
        assert_eq!(db.resolve("leftctrl"), Some(Key::KEY_LEFTCTRL));
        assert_eq!(db.resolve("key_space"), Some(Key::KEY_SPACE));
    }

    #[test]
    fn rejects_unknown_names() {
        let db = KeycodeDb::new();
        assert_eq!(db.resolve("FROBNICATE"), None);
        assert_eq!(db.resolve(""), None);
    }

    #[test]
    fn table_has_no_duplicate_names() {
        let db = KeycodeDb::new();
        assert_eq!(db.lookup.len(), KEY_TABLE.len());
    }
}
