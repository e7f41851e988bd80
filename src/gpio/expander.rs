//! MCP23017 port expander capability.
//!
//! The expander hangs off the I2C bus and contributes two 8-bit banks of
//! inputs. Both banks are configured as pulled-up inputs with
//! interrupt-on-change; the chip's INT output (mirrored across banks,
//! open-drain) is wired to a header GPIO pin that the multiplexer watches.

use std::path::Path;

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;

use super::GpioError;
use crate::models::Bank;

// Register addresses in bank-0 (interleaved) mode.
const IODIRA: u8 = 0x00;
const IODIRB: u8 = 0x01;
const IPOLA: u8 = 0x02;
const IPOLB: u8 = 0x03;
const GPINTENA: u8 = 0x04;
const GPINTENB: u8 = 0x05;
const GPPUA: u8 = 0x0C;
const GPPUB: u8 = 0x0D;
const INTCAPA: u8 = 0x10;
const INTCAPB: u8 = 0x11;
const GPIOA: u8 = 0x12;
const GPIOB: u8 = 0x13;

/// IOCON address when the chip is (possibly) still in bank-1 mode.
const IOCON_BANK1: u8 = 0x05;
/// IOCON address once in bank-0 mode.
const IOCONA: u8 = 0x0A;
/// IOCON value: bank 0, mirrored INT, sequential, open-drain IRQ.
const IOCON_MODE: u8 = 0x44;

/// One MCP23017 chip.
pub struct Mcp23017 {
    dev: LinuxI2CDevice,
}

impl Mcp23017 {
    /// Opens the chip at `addr` on the given bus device.
    pub fn open(bus: impl AsRef<Path>, addr: u16) -> Result<Self, GpioError> {
        let dev = LinuxI2CDevice::new(bus, addr)?;
        Ok(Self { dev })
    }

    /// Puts the chip into the daemon's operating mode: bank 0, every line an
    /// input with pull-up and interrupt-on-change, normal polarity, and any
    /// latched interrupt cleared.
    pub fn configure(&mut self) -> Result<(), GpioError> {
        // If the chip is still in bank-1 mode, address 0x05 is IOCON and
        // this write switches it to bank 0. If it was already in bank 0 the
        // write hits GPINTENB, which is rewritten below.
        self.dev.smbus_write_byte_data(IOCON_BANK1, 0x00)?;
        self.dev.smbus_write_byte_data(IOCONA, IOCON_MODE)?;

        self.dev.smbus_write_byte_data(IODIRA, 0xFF)?;
        self.dev.smbus_write_byte_data(IODIRB, 0xFF)?;
        self.dev.smbus_write_byte_data(IPOLA, 0x00)?;
        self.dev.smbus_write_byte_data(IPOLB, 0x00)?;
        self.dev.smbus_write_byte_data(GPPUA, 0xFF)?;
        self.dev.smbus_write_byte_data(GPPUB, 0xFF)?;
        self.dev.smbus_write_byte_data(GPINTENA, 0xFF)?;
        self.dev.smbus_write_byte_data(GPINTENB, 0xFF)?;

        self.dev.smbus_read_byte_data(INTCAPA)?;
        self.dev.smbus_read_byte_data(INTCAPB)?;
        Ok(())
    }

    /// Reads both banks. Reading the GPIO registers also releases the INT
    /// line, re-arming the interrupt.
    pub fn read_banks(&mut self) -> Result<u16, GpioError> {
        let a = self.dev.smbus_read_byte_data(GPIOA)?;
        let b = self.dev.smbus_read_byte_data(GPIOB)?;
        Ok((u16::from(b) << 8) | u16::from(a))
    }
}

/// Whether a bank bit reads as pressed. Buttons pull expander lines to
/// ground, so a low bit means pressed.
#[must_use]
pub fn pressed(banks: u16, bank: Bank, bit: u8) -> bool {
    let position = match bank {
        Bank::A => bit,
        Bank::B => 8 + bit,
    };
    banks & (1 << position) == 0
}
