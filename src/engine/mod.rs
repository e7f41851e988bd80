//! The input engine: the debounce/repeat/combo state machine, the blocking
//! event multiplexer, and the daemon runtime with its hot-reload controller.

pub mod mux;
pub mod runtime;
pub mod state;

pub use runtime::Daemon;

/// Everything the main loop reacts to, in one place.
///
/// The first four variants drive the input state machine; the last two are
/// consumed by the hot-reload controller before they reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A line descriptor signalled and its level was read.
    LineChanged {
        /// Input-line index (position in [`crate::models::Configuration::input_lines`]).
        line: usize,
        /// Debounce-relevant level: true = pressed.
        pressed: bool,
    },
    /// The debounce window expired with no further change.
    DebounceElapsed,
    /// The combo's hold duration completed.
    ComboElapsed,
    /// The key-repeat interval completed.
    RepeatElapsed,
    /// A reload was requested (signal or config-file change).
    ReloadRequested,
    /// A terminating signal arrived.
    Shutdown,
}
