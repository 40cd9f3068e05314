//! Periodic polling of a driver instance.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::*;
use mcp300::{Mcp300x, Mode};

/// One round's worth of data for a channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub channel: u8,
    pub raw: u16,
    pub voltage: f32,
    pub frame: [u8; 3],
    /// Code measured against the channel's differential partner, if requested.
    pub differential: Option<u16>,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CH{}: {:4} ({:.3} V) raw {:02x?}",
            self.channel, self.raw, self.voltage, self.frame
        )?;
        if let (Some(code), Some((positive, negative))) = (
            self.differential,
            mcp300::differential_pair(self.channel),
        ) {
            write!(f, ", CH{positive}-CH{negative}: {code:4}")?;
        }
        Ok(())
    }
}

/// How often, and how many times, to sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub interval: Duration,
    /// `None` samples until an error occurs.
    pub count: Option<u64>,
}

/// Reads every channel once, in order.
pub fn sample_once<SPI: SpiBus, CS: OutputPin>(
    adc: &mut Mcp300x<SPI, CS>,
    channels: &[u8],
    differential: bool,
) -> mcp300::Result<Vec<Reading>, SPI, CS> {
    channels
        .iter()
        .map(|&channel| -> mcp300::Result<Reading, SPI, CS> {
            let frame = adc.read_raw(channel, Mode::SingleEnded)?;
            let raw = mcp300::decode(&frame);

            let differential = if differential {
                Some(adc.read(channel, Mode::Differential)?)
            } else {
                None
            };

            Ok(Reading {
                channel,
                raw,
                voltage: mcp300::to_voltage(raw, adc.reference_voltage()),
                frame,
                differential,
            })
        })
        .collect()
}

/// Samples `channels` on `schedule`, writing one block per round to `out`.
///
/// The selection is checked against the model before the first exchange. Any error stops
/// the loop.
pub fn run<SPI, CS>(
    adc: &mut Mcp300x<SPI, CS>,
    channels: &[u8],
    differential: bool,
    schedule: Schedule,
    mut out: impl Write,
) -> Result<()>
where
    SPI: SpiBus,
    SPI::Error: Send + Sync + 'static,
    CS: OutputPin,
    CS::Error: Send + Sync + 'static,
{
    for &channel in channels {
        adc.validate_channel(channel)
            .with_context(|| format!("Cannot sample channel {channel}"))?;
    }

    info!(
        "Sampling {} channel(s) of {} every {}",
        channels.len(),
        adc.model(),
        humantime::format_duration(schedule.interval)
    );

    let mut round = 0u64;
    loop {
        let readings =
            sample_once(adc, channels, differential).with_context(|| "Cannot read ADC")?;
        debug!("Round {round}: {} reading(s)", readings.len());

        writeln!(out, "--")?;
        for reading in &readings {
            writeln!(out, "{reading}")?;
        }
        out.flush()?;

        round += 1;
        if schedule.count.is_some_and(|count| round >= count) {
            break;
        }
        std::thread::sleep(schedule.interval);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};
    use mcp300::Model;

    fn exchange(sent: [u8; 3], received: [u8; 3]) -> [SpiTransaction<u8>; 2] {
        [
            SpiTransaction::transfer_in_place(sent.to_vec(), received.to_vec()),
            SpiTransaction::flush(),
        ]
    }

    fn select_cycles(exchanges: usize) -> Vec<PinTransaction> {
        let mut pin = vec![PinTransaction::set(PinState::High)];
        for _ in 0..exchanges {
            pin.push(PinTransaction::set(PinState::Low));
            pin.push(PinTransaction::set(PinState::High));
        }
        pin
    }

    #[test]
    fn single_ended_and_differential_per_channel() {
        let spi: Vec<_> = [
            exchange([0x01, 0xB0, 0x00], [0x00, 0x02, 0xFF]),
            exchange([0x01, 0x30, 0x00], [0x00, 0x00, 0x10]),
        ]
        .concat();
        let pin = select_cycles(2);

        let mut adc =
            Mcp300x::with_model(SpiMock::new(&spi), PinMock::new(&pin), Model::Mcp3008, 3.3)
                .unwrap();

        let readings = sample_once(&mut adc, &[3], true).unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].raw, 767);
        assert_eq!(readings[0].differential, Some(0x10));
        assert_eq!(
            readings[0].to_string(),
            "CH3:  767 (2.472 V) raw [00, 02, ff], CH3-CH2:   16"
        );

        let (mut spi, mut cs) = adc.release();
        spi.done();
        cs.done();
    }

    #[test]
    fn runs_the_requested_number_of_rounds() {
        let spi: Vec<_> = [
            exchange([0x01, 0x80, 0x00], [0x00, 0x02, 0x00]),
            exchange([0x01, 0x90, 0x00], [0x00, 0x00, 0x00]),
            exchange([0x01, 0x80, 0x00], [0x00, 0x03, 0xFF]),
            exchange([0x01, 0x90, 0x00], [0x00, 0x00, 0x01]),
        ]
        .concat();
        let pin = select_cycles(4);

        let mut adc =
            Mcp300x::with_model(SpiMock::new(&spi), PinMock::new(&pin), Model::Mcp3002, 3.3)
                .unwrap();

        let schedule = Schedule {
            interval: Duration::ZERO,
            count: Some(2),
        };
        let mut out = Vec::new();

        run(&mut adc, &[0, 1], false, schedule, &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("CH0:  512 (1.650 V)"), "{}", lines[1]);
        assert!(lines[5].starts_with("CH1:    1"), "{}", lines[5]);

        let (mut spi, mut cs) = adc.release();
        spi.done();
        cs.done();
    }

    #[test]
    fn invalid_selection_fails_before_any_exchange() {
        let pin = select_cycles(0);
        let mut adc =
            Mcp300x::with_model(SpiMock::<u8>::new(&[]), PinMock::new(&pin), Model::Mcp3004, 3.3)
                .unwrap();

        let schedule = Schedule {
            interval: Duration::ZERO,
            count: None,
        };
        let mut out = Vec::new();

        let err = run(&mut adc, &[0, 4], false, schedule, &mut out).unwrap_err();

        assert!(err.to_string().contains("channel 4"), "{err}");
        assert!(out.is_empty());

        let (mut spi, mut cs) = adc.release();
        spi.done();
        cs.done();
    }
}
