use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::{Mcp300x, Mode, Model, Result};

/// MCP3002 driver
///
/// Driven with the same 3-byte frame as the rest of the family.
pub struct Mcp3002<SPI, CS> {
    adc: Mcp300x<SPI, CS>,
}

impl<SPI: SpiBus, CS: OutputPin> Mcp3002<SPI, CS> {
    /// Creates a new driver from an SPI bus and its chip-select pin.
    /// Please ensure the SPI bus is in SPI mode 0, aka (0, 0).
    pub fn new(spi: SPI, cs: CS, reference_voltage: f32) -> Result<Self, SPI, CS> {
        let adc = Mcp300x::with_model(spi, cs, Model::Mcp3002, reference_voltage)?;
        Ok(Self { adc })
    }

    pub fn read_with_mode(&mut self, ch: Channel, mode: Mode) -> Result<u16, SPI, CS> {
        self.adc.read(ch as u8, mode)
    }

    /// Read a channel and return the 10 bit value as a [`u16`] in single-ended mode.
    pub fn read(&mut self, ch: Channel) -> Result<u16, SPI, CS> {
        self.read_with_mode(ch, Mode::SingleEnded)
    }

    /// `CH0 - CH1` for [`Channel::CH0`], `CH1 - CH0` for [`Channel::CH1`].
    pub fn read_differential(&mut self, ch: Channel) -> Result<u16, SPI, CS> {
        self.read_with_mode(ch, Mode::Differential)
    }

    pub fn read_raw(&mut self, ch: Channel, mode: Mode) -> Result<[u8; 3], SPI, CS> {
        self.adc.read_raw(ch as u8, mode)
    }

    pub fn read_voltage(&mut self, ch: Channel) -> Result<f32, SPI, CS> {
        self.adc.read_voltage(ch as u8)
    }

    /// Gives back the bus and chip-select pin.
    pub fn release(self) -> (SPI, CS) {
        self.adc.release()
    }
}

/// Channel list for MCP3002
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    CH0 = 0,
    CH1 = 1,
}

impl Channel {
    /// Iterate over all channels.
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::CH0, Self::CH1].into_iter()
    }
}
