//! The blocking event multiplexer.
//!
//! One `poll(2)` across every descriptor the daemon cares about, with a
//! single scalar timeout derived from the engine's live wait class. The
//! descriptor set is rebuilt each iteration: the control channel is stable,
//! but line descriptors change on every reload.

use std::os::fd::{BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use super::state::Wait;

/// Which descriptor a wake came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The signal descriptor.
    Signal,
    /// The config-file watch descriptor.
    FileWatch,
    /// The config-directory watch descriptor.
    DirWatch,
    /// A line value descriptor, by input-line index.
    Line(usize),
    /// The port expander's IRQ line descriptor.
    ExpanderIrq,
}

/// The descriptor set for one blocking wait.
#[derive(Default)]
pub struct PollSet<'fd> {
    slots: Vec<Slot>,
    fds: Vec<PollFd<'fd>>,
}

impl<'fd> PollSet<'fd> {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one descriptor.
    pub fn push(&mut self, slot: Slot, fd: BorrowedFd<'fd>, flags: PollFlags) {
        self.slots.push(slot);
        self.fds.push(PollFd::new(fd, flags));
    }

    /// Adds one descriptor by raw fd, for handle types that predate the
    /// I/O-safety traits. The caller must keep the descriptor open for the
    /// life of the set.
    pub fn push_raw(&mut self, slot: Slot, fd: RawFd, flags: PollFlags) {
        // SAFETY: per this method's contract, the fd stays open while the
        // set (and the BorrowedFd inside it) lives.
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        self.push(slot, fd, flags);
    }

    /// Blocks until activity or timeout. Returns the slots with activity,
    /// in insertion order; an empty result means the timeout expired.
    pub fn wait(mut self, timeout: PollTimeout) -> nix::Result<Vec<Slot>> {
        loop {
            match poll(&mut self.fds, timeout) {
                // All signals arrive through the signalfd, so an EINTR here
                // is a stray wake; retry.
                Err(Errno::EINTR) => {}
                Err(err) => return Err(err),
                Ok(0) => return Ok(Vec::new()),
                Ok(_) => break,
            }
        }
        let ready = self
            .slots
            .iter()
            .zip(&self.fds)
            .filter(|(_, fd)| fd.revents().is_some_and(|r| !r.is_empty()))
            .map(|(slot, _)| *slot)
            .collect();
        Ok(ready)
    }
}

/// Converts the engine's wait class into the poll timeout.
#[must_use]
pub fn wait_timeout(wait: Wait) -> PollTimeout {
    match wait {
        Wait::Idle => PollTimeout::NONE,
        Wait::Debounce(d) | Wait::ComboHold(d) | Wait::Repeat(d) => {
            let ms = d.as_millis().min(u128::from(u16::MAX)) as u16;
            PollTimeout::from(ms)
        }
    }
}
