//! Internal pull-up control.
//!
//! Sysfs exposes no interface to the internal pull-up resistors, so the
//! pull control and clock registers of the GPIO block are driven directly
//! through a `/dev/mem` mapping. The hardware requires a two-phase
//! protocol: assert the pull type on the control register, wait a settle
//! period, strobe the affected-pin bitmask on the clock register, wait
//! again, then clear both registers.

use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::NonNull;
use std::thread;

use nix::libc;
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use super::board::BoardRevision;
use super::GpioError;
use crate::constants::PULLUP_SETTLE;

/// Length of the mapped register block.
const BLOCK_SIZE: usize = 4 * 1024;
/// Word index of the pull-type control register.
const GPPUD: usize = 0x94 / 4;
/// Word index of the pull clock register.
const GPPUDCLK0: usize = 0x98 / 4;
/// Control value selecting the pull-up resistor.
const PULL_UP: u32 = 2;
/// Control value selecting no pull.
const PULL_OFF: u32 = 0;

/// The register pair the two-phase protocol is driven against.
///
/// A trait seam so the protocol itself can be exercised against a recording
/// fake; the only production implementation is [`GpioMem`].
pub trait PullRegisters {
    /// Writes the pull-type control register.
    fn write_control(&mut self, value: u32);
    /// Writes the pull clock register.
    fn write_clock(&mut self, value: u32);
    /// Waits the minimum settle period between phases.
    fn settle(&mut self);
}

/// Enables the pull-up on every pin in `mask`.
pub fn enable<R: PullRegisters + ?Sized>(regs: &mut R, mask: u32) {
    drive(regs, PULL_UP, mask);
}

/// Disables any pull on every pin in `mask`.
pub fn disable<R: PullRegisters + ?Sized>(regs: &mut R, mask: u32) {
    drive(regs, PULL_OFF, mask);
}

fn drive<R: PullRegisters + ?Sized>(regs: &mut R, control: u32, mask: u32) {
    regs.write_control(control);
    regs.settle();
    regs.write_clock(mask);
    regs.settle();
    regs.write_control(PULL_OFF);
    regs.write_clock(0);
}

/// The GPIO register block mapped from `/dev/mem`.
///
/// Held for the whole process lifetime: pull-ups are asserted on every load
/// and released on every unload.
#[derive(Debug)]
pub struct GpioMem {
    base: NonNull<u32>,
}

impl GpioMem {
    /// Maps the register block for the detected board.
    pub fn open(board: BoardRevision) -> Result<Self, GpioError> {
        let mem = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(GpioError::Mem)?;
        let len = NonZeroUsize::new(BLOCK_SIZE).ok_or(GpioError::Map(nix::Error::EINVAL))?;
        // SAFETY: mapping a fresh region chosen by the kernel; no existing
        // Rust memory is aliased. The offset is the board's GPIO block.
        let base = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &mem,
                board.gpio_register_base() as libc::off_t,
            )
        }
        .map_err(GpioError::Map)?;
        // The fd is not needed once the mapping exists.
        drop(mem);
        Ok(Self { base: base.cast() })
    }

    fn write_reg(&mut self, index: usize, value: u32) {
        // SAFETY: index is one of the two register constants, both well
        // inside the mapped block; volatile because this is device memory.
        unsafe {
            self.base.as_ptr().add(index).write_volatile(value);
        }
    }
}

impl PullRegisters for GpioMem {
    fn write_control(&mut self, value: u32) {
        self.write_reg(GPPUD, value);
    }

    fn write_clock(&mut self, value: u32) {
        self.write_reg(GPPUDCLK0, value);
    }

    fn settle(&mut self) {
        thread::sleep(PULLUP_SETTLE);
    }
}

impl Drop for GpioMem {
    fn drop(&mut self) {
        // SAFETY: base came from mmap with BLOCK_SIZE and is unmapped once.
        let _ = unsafe { munmap(self.base.cast(), BLOCK_SIZE) };
    }
}
