//! Daemon runtime.
//!
//! Owns the process-lifetime resources (signal fd, config watches, the
//! mapped pull-up registers) and the per-configuration pipeline (parsed
//! config, pin resources, virtual keyboard, engine state). The hot-reload
//! controller lives here: a reload signal or config-file change unloads the
//! whole pipeline and rebuilds it, while the control descriptors stay put.

use std::os::fd::{AsFd, AsRawFd};
use std::thread;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use nix::poll::PollFlags;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};

use super::mux::{self, PollSet, Slot};
use super::state::{Engine, Step, Wait};
use super::Event;
use crate::config::ConfigPaths;
use crate::constants::{COMBO_EVENT_GAP, KEYBOARD_DEVICE_NAME};
use crate::gpio::board::BoardRevision;
use crate::gpio::expander;
use crate::gpio::pullup::GpioMem;
use crate::gpio::sysfs::{self, SysfsGpio};
use crate::keyboard::{KeyValue, UinputKeyboard};
use crate::keycode_db::KeycodeDb;
use crate::models::{Configuration, PinId};
use crate::parser;
use crate::pins::ActivePins;

/// Everything owned by one loaded configuration. Constructed by `load`,
/// consumed by `unload`; nothing of it survives a reload.
struct Pipeline {
    config: Configuration,
    pins: ActivePins,
    keyboard: UinputKeyboard,
    engine: Engine,
}

impl Pipeline {
    /// Loads the config file and acquires every resource it calls for.
    ///
    /// A missing file is not an error: `prior` (the configuration from
    /// before the reload) stays in effect, or an empty one on first load.
    /// Resource acquisition failures are fatal; anything already acquired
    /// is released before the error propagates.
    fn load(
        paths: &ConfigPaths,
        db: &KeycodeDb,
        board: BoardRevision,
        regs: &mut GpioMem,
        prior: Option<Configuration>,
    ) -> Result<Self> {
        let config = parser::load(&paths.path, db, board.pin_aliases())
            .or(prior)
            .unwrap_or_else(Configuration::empty);
        info!(
            "configuration: {} line(s){}{}",
            config.lines.len(),
            if config.combo.is_some() { ", combo" } else { "" },
            if config.expander.is_some() { ", expander" } else { "" },
        );

        let (mut pins, levels) = ActivePins::activate(&config, SysfsGpio::system(), regs)?;

        let mut keyboard = UinputKeyboard::new();
        for key in config.mapped_keys() {
            keyboard.register(key);
        }
        if let Err(err) = keyboard.create(KEYBOARD_DEVICE_NAME) {
            pins.teardown(regs);
            return Err(err);
        }
        keyboard.resolve_event_path();

        let engine = Engine::new(&config, &levels);
        Ok(Self { config, pins, keyboard, engine })
    }

    /// Releases every resource, sink first, and hands back the
    /// configuration so a reload can keep it if the file has vanished.
    fn unload(mut self, regs: &mut GpioMem) -> Configuration {
        self.keyboard.destroy();
        self.pins.teardown(regs);
        self.config
    }
}

/// The daemon: control descriptors, pull-up registers, and the live
/// pipeline, driven by one blocking multiplexer loop.
pub struct Daemon {
    paths: ConfigPaths,
    db: KeycodeDb,
    board: BoardRevision,
    regs: GpioMem,
    signals: SignalFd,
    file_watch: Option<Inotify>,
    dir_watch: Option<Inotify>,
    pipeline: Option<Pipeline>,
    shutdown: bool,
}

impl Daemon {
    /// Sets up signals, watches and hardware access, then loads the initial
    /// pipeline. Failures here are fatal.
    pub fn new(paths: ConfigPaths) -> Result<Self> {
        // Every signal is blocked and routed through the signal fd, so
        // teardown always runs from the main loop.
        let mask = SigSet::all();
        mask.thread_block().context("can't block signals")?;
        let signals =
            SignalFd::with_flags(&mask, SfdFlags::empty()).context("can't create signal fd")?;

        let dir_watch = Self::watch_dir(&paths);
        let file_watch = Self::watch_file(&paths);

        let board = BoardRevision::detect();
        debug!("board revision: {board:?}");
        let mut regs = GpioMem::open(board)?;

        let db = KeycodeDb::new();
        let pipeline = Pipeline::load(&paths, &db, board, &mut regs, None)?;

        Ok(Self {
            paths,
            db,
            board,
            regs,
            signals,
            file_watch,
            dir_watch,
            pipeline: Some(pipeline),
            shutdown: false,
        })
    }

    /// Watches the config directory for the file being created, renamed in
    /// or out, or deleted. Held for the process lifetime.
    fn watch_dir(paths: &ConfigPaths) -> Option<Inotify> {
        let flags = AddWatchFlags::IN_CREATE
            | AddWatchFlags::IN_MOVED_TO
            | AddWatchFlags::IN_MOVED_FROM
            | AddWatchFlags::IN_DELETE;
        match Inotify::init(InitFlags::empty()) {
            Ok(ino) => match ino.add_watch(paths.dir.as_path(), flags) {
                Ok(_) => Some(ino),
                Err(err) => {
                    warn!("can't watch {}: {err}", paths.dir.display());
                    None
                }
            },
            Err(err) => {
                warn!("inotify unavailable: {err}");
                None
            }
        }
    }

    /// Watches the config file itself. A missing file is fine — the
    /// directory watch re-establishes this watch when the file appears.
    fn watch_file(paths: &ConfigPaths) -> Option<Inotify> {
        let ino = match Inotify::init(InitFlags::empty()) {
            Ok(ino) => ino,
            Err(err) => {
                warn!("inotify unavailable: {err}");
                return None;
            }
        };
        match ino.add_watch(
            paths.path.as_path(),
            AddWatchFlags::IN_MODIFY | AddWatchFlags::IN_IGNORED,
        ) {
            Ok(_) => {
                debug!("watching {}", paths.path.display());
                Some(ino)
            }
            Err(err) => {
                debug!("not watching config file yet: {err}");
                None
            }
        }
    }

    /// Runs until a terminating signal. Teardown happens on both the clean
    /// and the error path.
    pub fn run(&mut self) -> Result<()> {
        let result = self.serve();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.unload(&mut self.regs);
        }
        result
    }

    fn serve(&mut self) -> Result<()> {
        while !self.shutdown {
            // A wake's events are always handled to completion; the
            // shutdown flag is only consulted back here.
            for event in self.next_events()? {
                self.dispatch(event)?;
            }
        }
        info!("shutting down");
        Ok(())
    }

    /// One blocking wait, classified into events. Ready line descriptors
    /// are drained first, then the expander, then the control channel; a
    /// timeout maps to whichever timeout class was live.
    fn next_events(&mut self) -> Result<Vec<Event>> {
        let wait = self
            .pipeline
            .as_ref()
            .map_or(Wait::Idle, |p| p.engine.wait());

        let ready = {
            let mut set = PollSet::new();
            set.push_raw(Slot::Signal, self.signals.as_raw_fd(), PollFlags::POLLIN);
            if let Some(watch) = &self.file_watch {
                set.push_raw(Slot::FileWatch, watch.as_fd().as_raw_fd(), PollFlags::POLLIN);
            }
            if let Some(watch) = &self.dir_watch {
                set.push_raw(Slot::DirWatch, watch.as_fd().as_raw_fd(), PollFlags::POLLIN);
            }
            if let Some(pipeline) = &self.pipeline {
                for (idx, fd) in pipeline.pins.lines() {
                    set.push(Slot::Line(idx), fd.as_fd(), PollFlags::POLLPRI);
                }
                if let Some(fd) = pipeline.pins.irq_fd() {
                    set.push(Slot::ExpanderIrq, fd.as_fd(), PollFlags::POLLPRI);
                }
            }
            set.wait(mux::wait_timeout(wait)).context("poll failed")?
        };

        if ready.is_empty() {
            return Ok(match wait {
                Wait::Debounce(_) => vec![Event::DebounceElapsed],
                Wait::ComboHold(_) => vec![Event::ComboElapsed],
                Wait::Repeat(_) => vec![Event::RepeatElapsed],
                Wait::Idle => Vec::new(),
            });
        }

        let mut events = Vec::new();
        for slot in &ready {
            if let Slot::Line(idx) = slot {
                events.extend(self.read_line(*idx));
            }
        }
        if ready.contains(&Slot::ExpanderIrq) {
            events.extend(self.read_expander());
        }
        for slot in &ready {
            match slot {
                Slot::Signal => events.extend(self.drain_signal()),
                Slot::FileWatch => events.extend(self.drain_file_watch()),
                Slot::DirWatch => events.extend(self.drain_dir_watch()),
                Slot::Line(_) | Slot::ExpanderIrq => {}
            }
        }
        Ok(events)
    }

    /// Reads a ready line descriptor. Short reads are tolerated; the next
    /// edge re-synchronizes.
    fn read_line(&self, idx: usize) -> Option<Event> {
        let pipeline = self.pipeline.as_ref()?;
        let (_, file) = pipeline.pins.lines().find(|(i, _)| *i == idx)?;
        match sysfs::read_pressed(file) {
            Ok(Some(pressed)) => Some(Event::LineChanged { line: idx, pressed }),
            Ok(None) => None,
            Err(err) => {
                warn!("line {idx} read failed: {err}");
                None
            }
        }
    }

    /// Acknowledges an expander interrupt: one bank read refreshes the raw
    /// level of every expander-backed line.
    fn read_expander(&mut self) -> Vec<Event> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Vec::new();
        };
        let Some(banks) = pipeline.pins.read_expander_banks() else {
            return Vec::new();
        };
        pipeline
            .config
            .input_lines()
            .enumerate()
            .filter_map(|(idx, line)| match line.pin {
                PinId::Expander { bank, bit } => Some(Event::LineChanged {
                    line: idx,
                    pressed: expander::pressed(banks, bank, bit),
                }),
                PinId::Gpio(_) => None,
            })
            .collect()
    }

    /// One queued signal: the reload signal rebuilds the pipeline, anything
    /// else terminating sets the shutdown flag.
    fn drain_signal(&mut self) -> Option<Event> {
        match self.signals.read_signal() {
            Ok(Some(info)) => {
                if info.ssi_signo == Signal::SIGHUP as u32 {
                    info!("SIGHUP: reloading");
                    Some(Event::ReloadRequested)
                } else {
                    info!("signal {}: terminating", info.ssi_signo);
                    Some(Event::Shutdown)
                }
            }
            Ok(None) => None,
            Err(err) => {
                warn!("signal read failed: {err}");
                None
            }
        }
    }

    /// Config-file watch: a modify reloads; the watch being invalidated
    /// (file deleted, or the kernel's echo of a watch removal) only drops
    /// the watch — the loaded configuration stays in effect.
    fn drain_file_watch(&mut self) -> Option<Event> {
        let events = {
            let watch = self.file_watch.as_ref()?;
            match watch.read_events() {
                Ok(events) => events,
                Err(err) => {
                    warn!("file watch read failed: {err}");
                    return None;
                }
            }
        };
        let mut reload = false;
        for event in events {
            if event.mask.contains(AddWatchFlags::IN_MODIFY) {
                info!("config file changed: reloading");
                reload = true;
            } else if event.mask.contains(AddWatchFlags::IN_IGNORED) {
                info!("config file watch gone; keeping current mapping");
                self.file_watch = None;
            }
        }
        reload.then_some(Event::ReloadRequested)
    }

    /// Config-directory watch: the config file appearing re-establishes the
    /// file watch and reloads; it vanishing drops only the file watch.
    /// Events for other names in the directory are ignored.
    fn drain_dir_watch(&mut self) -> Option<Event> {
        let events = {
            let watch = self.dir_watch.as_ref()?;
            match watch.read_events() {
                Ok(events) => events,
                Err(err) => {
                    warn!("directory watch read failed: {err}");
                    return None;
                }
            }
        };
        let mut reload = false;
        for event in events {
            let Some(name) = &event.name else { continue };
            if name.as_os_str() != self.paths.name {
                debug!("ignoring directory event for {name:?}");
                continue;
            }
            if event
                .mask
                .intersects(AddWatchFlags::IN_CREATE | AddWatchFlags::IN_MOVED_TO)
            {
                info!("config file appeared: reloading");
                self.file_watch = Self::watch_file(&self.paths);
                reload = true;
            } else if event
                .mask
                .intersects(AddWatchFlags::IN_MOVED_FROM | AddWatchFlags::IN_DELETE)
            {
                info!("config file went away; keeping current mapping");
                self.file_watch = None;
            }
        }
        reload.then_some(Event::ReloadRequested)
    }

    /// The single dispatch point for every event class.
    fn dispatch(&mut self, event: Event) -> Result<()> {
        match event {
            Event::ReloadRequested => self.reload(),
            Event::Shutdown => {
                self.shutdown = true;
                Ok(())
            }
            engine_event => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    let step = pipeline.engine.handle(engine_event);
                    Self::emit(&mut pipeline.keyboard, &step);
                }
                Ok(())
            }
        }
    }

    /// Sends a step's key events: one flush for the whole batch, and the
    /// paced press+release pair when the combo fired. Write failures are
    /// logged and absorbed.
    fn emit(keyboard: &mut UinputKeyboard, step: &Step) {
        if !step.actions.is_empty() {
            for action in &step.actions {
                keyboard.emit(action.key, action.value);
            }
            if let Err(err) = keyboard.flush() {
                warn!("{err:#}");
            }
        }
        if let Some(key) = step.combo_fired {
            info!("combo fired");
            for value in [KeyValue::Press, KeyValue::Release] {
                keyboard.emit(key, value);
                if let Err(err) = keyboard.flush() {
                    warn!("{err:#}");
                }
                thread::sleep(COMBO_EVENT_GAP);
            }
        }
    }

    /// Unload strictly before reload: line and key slots are reused across
    /// cycles, so stale pull-ups or registrations must never leak into the
    /// next configuration.
    fn reload(&mut self) -> Result<()> {
        let prior = self
            .pipeline
            .take()
            .map(|pipeline| pipeline.unload(&mut self.regs));
        let pipeline = Pipeline::load(&self.paths, &self.db, self.board, &mut self.regs, prior)?;
        self.pipeline = Some(pipeline);
        Ok(())
    }
}
