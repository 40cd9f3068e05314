use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::{Mcp300x, Mode, Model, Result};

/// MCP3008 driver
pub struct Mcp3008<SPI, CS> {
    adc: Mcp300x<SPI, CS>,
}

impl<SPI: SpiBus, CS: OutputPin> Mcp3008<SPI, CS> {
    /// Creates a new driver from an SPI bus and its chip-select pin.
    /// Please ensure the SPI bus is in SPI mode 0, aka (0, 0).
    pub fn new(spi: SPI, cs: CS, reference_voltage: f32) -> Result<Self, SPI, CS> {
        let adc = Mcp300x::with_model(spi, cs, Model::Mcp3008, reference_voltage)?;
        Ok(Self { adc })
    }

    /// Read a MCP3008 ADC channel and return the 10 bit value as a [`u16`] in the given mode.
    pub fn read_with_mode(&mut self, ch: Channel, mode: Mode) -> Result<u16, SPI, CS> {
        self.adc.read(ch as u8, mode)
    }

    /// Read a MCP3008 ADC channel and return the 10 bit value as a [`u16`] in single-ended mode.
    pub fn read(&mut self, ch: Channel) -> Result<u16, SPI, CS> {
        self.read_with_mode(ch, Mode::SingleEnded)
    }

    /// Read a channel against its partner, see [`crate::DIFFERENTIAL_PAIRS`].
    pub fn read_differential(&mut self, ch: Channel) -> Result<u16, SPI, CS> {
        self.read_with_mode(ch, Mode::Differential)
    }

    pub fn read_raw(&mut self, ch: Channel, mode: Mode) -> Result<[u8; 3], SPI, CS> {
        self.adc.read_raw(ch as u8, mode)
    }

    /// Read a channel in single-ended mode, scaled to volts.
    pub fn read_voltage(&mut self, ch: Channel) -> Result<f32, SPI, CS> {
        self.adc.read_voltage(ch as u8)
    }

    /// Gives back the bus and chip-select pin.
    pub fn release(self) -> (SPI, CS) {
        self.adc.release()
    }
}

/// Channel list for MCP3008
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    CH0 = 0,
    CH1 = 1,
    CH2 = 2,
    CH3 = 3,
    CH4 = 4,
    CH5 = 5,
    CH6 = 6,
    CH7 = 7,
}

impl Channel {
    /// Iterate over all channels.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::CH0,
            Self::CH1,
            Self::CH2,
            Self::CH3,
            Self::CH4,
            Self::CH5,
            Self::CH6,
            Self::CH7,
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{bus, Event};

    #[test]
    fn every_channel_is_addressed_in_both_modes() {
        let (spi, cs, log) = bus([0x00, 0x03, 0xFF], false);
        let mut mcp = Mcp3008::new(spi, cs, 3.3).unwrap();

        for ch in Channel::all() {
            assert_eq!(mcp.read(ch), Ok(1023));
            assert_eq!(mcp.read_differential(ch), Ok(1023));
        }

        let sent: Vec<u8> = log
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Transfer(frame) => Some(frame[1]),
                _ => None,
            })
            .collect();

        let expected: Vec<u8> = (0..8u8)
            .flat_map(|ch| [0x80 | ch << 4, ch << 4])
            .collect();

        assert_eq!(sent, expected);
    }

    #[test]
    fn raw_frame_is_returned_untouched() {
        let (spi, cs, _) = bus([0x01, 0x02, 0xFF], false);
        let mut mcp = Mcp3008::new(spi, cs, 3.3).unwrap();

        assert_eq!(mcp.read_raw(Channel::CH3, Mode::SingleEnded), Ok([0x01, 0x02, 0xFF]));
        assert_eq!(mcp.read(Channel::CH3), Ok(767));
    }
}
