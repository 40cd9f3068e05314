//! Raspberry Pi wiring: a `/dev/spidev` bus plus a GPIO line as chip-select.

use anyhow::{bail, Context, Result};
use log::*;
use mcp300::Mcp300x;
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{BitOrder, Bus, Mode, SlaveSelect, Spi};

use crate::commandline::CliArgs;

pub type Adc = Mcp300x<Spi, OutputPin>;

fn bus(index: u8) -> Result<Bus> {
    Ok(match index {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        3 => Bus::Spi3,
        4 => Bus::Spi4,
        5 => Bus::Spi5,
        6 => Bus::Spi6,
        other => bail!("There is no SPI bus {other}"),
    })
}

/// Opens the bus and chip-select pin described by `args`.
///
/// The kernel still toggles CE0 on its own; the ADC's CS has to be wired to `--cs-pin`.
pub fn open(args: &CliArgs) -> Result<Adc> {
    let spi = Spi::new(bus(args.bus)?, SlaveSelect::Ss0, args.clock_hz, Mode::Mode0)
        .with_context(|| format!("Cannot open SPI bus {}", args.bus))?;
    spi.set_bit_order(BitOrder::MsbFirst)
        .with_context(|| "Cannot set SPI bit order")?;

    let cs = Gpio::new()
        .with_context(|| "Cannot access GPIO")?
        .get(args.cs_pin)
        .with_context(|| format!("Cannot claim GPIO {}", args.cs_pin))?
        .into_output_high();

    debug!(
        "SPI{} at {} Hz, chip-select on GPIO {}",
        args.bus, args.clock_hz, args.cs_pin
    );

    Mcp300x::with_model(spi, cs, args.model, args.reference_voltage)
        .with_context(|| format!("Cannot initialise {}", args.model))
}
