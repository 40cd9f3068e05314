//! Provides a driver for the Microchip MCP3002/3004/3008 ADC family via the `embedded-hal` ecosystem.
//!
//! The driver owns an [`SpiBus`] and the chip-select [`OutputPin`] and brackets every
//! conversion with a chip-select guard, so the line is always returned to its idle (high)
//! level, including when the transfer itself fails.
//!
//! Every model is driven with the same 3-byte full-duplex frame:
//!
//! | byte | sent                         | received                 |
//! |------|------------------------------|--------------------------|
//! | 0    | start bit `0x01`             | don't care               |
//! | 1    | `SGL/DIFF << 7 \| ch << 4`   | null bit, `B9`, `B8`     |
//! | 2    | don't care                   | `B7`..`B0`               |

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

use core::fmt;
use core::mem::ManuallyDrop;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    };
}

#[cfg(feature = "mcp3002")]
pub mod mcp3002;

#[cfg(feature = "mcp3004")]
pub mod mcp3004;

#[cfg(feature = "mcp3008")]
pub mod mcp3008;

/// Reference voltage assumed by callers that don't measure their own.
pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 3.3;

/// Number of distinct codes produced by the 10 bit converter.
pub const RESOLUTION: u16 = 1024;

const START: u8 = 0b0000_0001;

/// Differential input pairs, indexed by channel: `(positive, negative)`.
pub const DIFFERENTIAL_PAIRS: [(u8, u8); 8] = [
    (0, 1),
    (1, 0),
    (2, 3),
    (3, 2),
    (4, 5),
    (5, 4),
    (6, 7),
    (7, 6),
];

/// Chip variant, identified by its number of input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Model {
    Mcp3002 = 2,
    Mcp3004 = 4,
    Mcp3008 = 8,
}

impl Model {
    /// Number of usable input channels.
    pub const fn channels(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Model {
    type Error = InvalidModel;

    fn try_from(channels: u8) -> core::result::Result<Self, Self::Error> {
        match channels {
            2 => Ok(Self::Mcp3002),
            4 => Ok(Self::Mcp3004),
            8 => Ok(Self::Mcp3008),
            other => Err(InvalidModel(other)),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mcp3002 => f.write_str("MCP3002"),
            Self::Mcp3004 => f.write_str("MCP3004"),
            Self::Mcp3008 => f.write_str("MCP3008"),
        }
    }
}

/// A channel count that doesn't name a supported chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a supported model, use 2 (MCP3002), 4 (MCP3004) or 8 (MCP3008)")]
pub struct InvalidModel(pub u8);

/// Input configuration for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// One pin measured against ground.
    #[default]
    SingleEnded,
    /// One pin measured against its partner, see [`DIFFERENTIAL_PAIRS`].
    Differential,
}

/// Errors raised by the driver.
///
/// `S` is the SPI bus error, `P` the chip-select pin error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error<S, P> {
    /// The channel count doesn't name a supported chip.
    #[error(transparent)]
    InvalidModel(#[from] InvalidModel),
    /// The channel doesn't exist on this chip. No bus activity took place.
    #[error("channel {channel} is out of range for a {channels} channel device")]
    ChannelOutOfRange { channel: u8, channels: u8 },
    /// The bus transfer failed. Chip-select has been released.
    #[error("SPI transfer failed: {0:?}")]
    Transport(S),
    /// The chip-select line could not be driven.
    #[error("chip-select pin failed: {0:?}")]
    ChipSelect(P),
}

/// Driver result type, parameterised over the bus and pin in use.
pub type Result<T, SPI, CS> = core::result::Result<
    T,
    Error<<SPI as embedded_hal::spi::ErrorType>::Error, <CS as embedded_hal::digital::ErrorType>::Error>,
>;

/// The `(positive, negative)` pins compared by a differential read of `channel`.
pub fn differential_pair(channel: u8) -> Option<(u8, u8)> {
    DIFFERENTIAL_PAIRS.get(channel as usize).copied()
}

/// Builds the command frame for a conversion of `channel` in `mode`.
///
/// Only the low three bits of `channel` are used; range checking against the model
/// is the driver's job.
pub fn command(channel: u8, mode: Mode) -> [u8; 3] {
    let mode = match mode {
        Mode::SingleEnded => 0b1000_0000,
        Mode::Differential => 0b0000_0000,
    };

    let channel = (channel & 0b111) << 4;

    [START, mode | channel, 0b0000_0000]
}

/// Extracts the 10 bit result from a response frame.
pub fn decode(frame: &[u8; 3]) -> u16 {
    // Discard the echoed command bits and the null bit
    u16::from_be_bytes([frame[1], frame[2]]) & 0b0000_0011_1111_1111
}

/// Scales a raw code linearly against the reference voltage.
pub fn to_voltage(raw: u16, reference_voltage: f32) -> f32 {
    raw as f32 * reference_voltage / RESOLUTION as f32
}

/// Holds chip-select asserted (low) for as long as it lives.
///
/// A pin that reports an error from `set_low` may still have gone low, so a failed
/// select is followed by a best-effort `set_high` before the error is returned.
struct Selected<'a, CS: OutputPin> {
    cs: &'a mut CS,
}

impl<'a, CS: OutputPin> Selected<'a, CS> {
    fn select(cs: &'a mut CS) -> core::result::Result<Self, CS::Error> {
        if let Err(err) = cs.set_low() {
            let _ = cs.set_high();
            return Err(err);
        }
        Ok(Self { cs })
    }

    /// Deselects, reporting a pin failure instead of swallowing it in `drop`.
    fn release(self) -> core::result::Result<(), CS::Error> {
        let mut this = ManuallyDrop::new(self);
        this.cs.set_high()
    }
}

impl<CS: OutputPin> Drop for Selected<'_, CS> {
    fn drop(&mut self) {
        // Only reached on a failed exchange, whose error is the one reported
        let _ = self.cs.set_high();
    }
}

/// Generic MCP300x driver over a dedicated SPI bus and chip-select pin.
///
/// The bus must be configured for SPI mode 0 (or 3), MSB first. The clock rate is the
/// caller's choice; 1 MHz is safe across the family at 2.7 V.
pub struct Mcp300x<SPI, CS> {
    spi: SPI,
    cs: CS,
    model: Model,
    reference_voltage: f32,
}

impl<SPI: SpiBus, CS: OutputPin> Mcp300x<SPI, CS> {
    /// Creates a driver for the chip with `channels` inputs (2, 4 or 8).
    ///
    /// Chip-select is driven to its idle (high) level before returning.
    pub fn new(spi: SPI, cs: CS, channels: u8, reference_voltage: f32) -> Result<Self, SPI, CS> {
        let model = Model::try_from(channels)?;
        Self::with_model(spi, cs, model, reference_voltage)
    }

    /// Creates a driver for a known [`Model`].
    pub fn with_model(
        spi: SPI,
        mut cs: CS,
        model: Model,
        reference_voltage: f32,
    ) -> Result<Self, SPI, CS> {
        cs.set_high().map_err(Error::ChipSelect)?;

        Ok(Self {
            spi,
            cs,
            model,
            reference_voltage,
        })
    }

    /// The chip variant this driver was built for.
    pub fn model(&self) -> Model {
        self.model
    }

    /// Voltage on VREF, used to scale single-ended readings.
    pub fn reference_voltage(&self) -> f32 {
        self.reference_voltage
    }

    /// Checks that `channel` exists on this chip, in either mode.
    pub fn validate_channel(&self, channel: u8) -> Result<(), SPI, CS> {
        let channels = self.model.channels();

        if channel >= channels {
            return Err(Error::ChannelOutOfRange { channel, channels });
        }

        Ok(())
    }

    /// Performs one conversion and returns the whole response frame.
    pub fn read_raw(&mut self, channel: u8, mode: Mode) -> Result<[u8; 3], SPI, CS> {
        self.validate_channel(channel)?;

        let mut frame = command(channel, mode);

        trace!("{} ch{} {:?} tx {:02x?}", self.model, channel, mode, frame);

        self.exchange(&mut frame)?;

        trace!("{} ch{} {:?} rx {:02x?}", self.model, channel, mode, frame);

        Ok(frame)
    }

    /// Full-duplex transfer of `frame` with chip-select held for exactly its duration.
    fn exchange(&mut self, frame: &mut [u8; 3]) -> Result<(), SPI, CS> {
        let Self { spi, cs, .. } = self;

        let selected = Selected::select(cs).map_err(Error::ChipSelect)?;

        // The transfer may still be in flight until flushed
        let transferred = spi.transfer_in_place(frame).and_then(|()| spi.flush());

        if let Err(err) = transferred {
            drop(selected);
            return Err(Error::Transport(err));
        }

        selected.release().map_err(Error::ChipSelect)
    }

    /// Read a channel and return the 10 bit value as a [`u16`].
    pub fn read(&mut self, channel: u8, mode: Mode) -> Result<u16, SPI, CS> {
        let frame = self.read_raw(channel, mode)?;

        Ok(decode(&frame))
    }

    /// Read a channel in single-ended mode and scale it to volts.
    ///
    /// Differential readings are signed across the pair and have no linear voltage here.
    pub fn read_voltage(&mut self, channel: u8) -> Result<f32, SPI, CS> {
        let raw = self.read(channel, Mode::SingleEnded)?;

        Ok(to_voltage(raw, self.reference_voltage))
    }

    /// Gives back the bus and chip-select pin.
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}
