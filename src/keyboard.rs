//! Virtual keyboard sink.
//!
//! Wraps a uinput virtual device: key codes are registered before the
//! device is created, emissions within one multiplexer wake are batched and
//! sent with a single synchronization report on `flush`, and `destroy` is
//! safe to call on a sink in any state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use log::{debug, info, warn};

/// Event value of a synthesized key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue {
    /// Key released.
    Release,
    /// Key pressed.
    Press,
    /// Key still held (auto-repeat).
    Repeat,
}

impl KeyValue {
    /// The raw event value (0/1/2) consumers see.
    #[must_use]
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Release => 0,
            Self::Press => 1,
            Self::Repeat => 2,
        }
    }
}

/// The uinput-backed virtual keyboard.
pub struct UinputKeyboard {
    keys: AttributeSet<Key>,
    device: Option<VirtualDevice>,
    pending: Vec<InputEvent>,
    event_path: Option<PathBuf>,
}

impl UinputKeyboard {
    /// An empty sink with nothing registered and no device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: AttributeSet::new(),
            device: None,
            pending: Vec::new(),
            event_path: None,
        }
    }

    /// Registers a key code the device will be able to emit. Repeated
    /// registration of the same code is a no-op. Must happen before
    /// [`create`](Self::create); late registrations are dropped with a
    /// warning.
    pub fn register(&mut self, key: Key) {
        if self.device.is_some() {
            warn!("key {key:?} registered after device creation, ignored");
            return;
        }
        self.keys.insert(key);
    }

    /// Creates the OS-visible virtual keyboard device.
    pub fn create(&mut self, name: &str) -> Result<()> {
        if self.device.is_some() {
            warn!("virtual keyboard already created");
            return Ok(());
        }
        let device = VirtualDeviceBuilder::new()
            .context("can't open /dev/uinput")?
            .name(name)
            .with_keys(&self.keys)
            .context("can't register key codes with uinput")?
            .build()
            .context("can't create virtual keyboard device")?;
        self.device = Some(device);
        info!("virtual keyboard '{name}' created");
        Ok(())
    }

    /// Whether [`create`](Self::create) has succeeded.
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.device.is_some()
    }

    /// Best-effort discovery of the `/dev/input/eventX` node backing the
    /// device. Some consumers want that node rather than the uinput handle;
    /// the discovered path is logged and kept for them, and emission falls
    /// back to the device handle when discovery fails.
    pub fn resolve_event_path(&mut self) -> Option<&Path> {
        let device = self.device.as_mut()?;
        match device.enumerate_dev_nodes_blocking() {
            Ok(nodes) => {
                self.event_path = nodes.filter_map(std::result::Result::ok).next();
            }
            Err(err) => debug!("event node discovery failed: {err}"),
        }
        match &self.event_path {
            Some(path) => {
                info!("virtual keyboard is {}", path.display());
                Some(path)
            }
            None => {
                debug!("no event node found, consumers must use the uinput device");
                None
            }
        }
    }

    /// The discovered event node, if any.
    #[must_use]
    pub fn event_path(&self) -> Option<&Path> {
        self.event_path.as_deref()
    }

    /// Queues one key event for the next flush.
    pub fn emit(&mut self, key: Key, value: KeyValue) {
        self.pending
            .push(InputEvent::new(EventType::KEY, key.code(), value.as_raw()));
    }

    /// Sends everything queued since the last flush as one batch, followed
    /// by a single synchronization report. A flush with nothing queued does
    /// nothing.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let Some(device) = self.device.as_mut() else {
            warn!("{} key events dropped, no virtual device", batch.len());
            return Ok(());
        };
        device.emit(&batch).context("virtual keyboard write failed")
    }

    /// Tears the device down and forgets all registrations. Safe on a sink
    /// in any state, including one that never finished creation; calling it
    /// twice is a no-op.
    pub fn destroy(&mut self) {
        if self.device.take().is_some() {
            info!("virtual keyboard destroyed");
        }
        self.pending.clear();
        self.keys = AttributeSet::new();
        self.event_path = None;
    }
}

impl Default for UinputKeyboard {
    fn default() -> Self {
        Self::new()
    }
}
