use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use mcp300::Model;
use std::time::Duration;

fn parse_model(s: &str) -> Result<Model, String> {
    let channels = s
        .parse::<u8>()
        .map_err(|e| format!("Invalid channel count format: {e}"))?;
    Model::try_from(channels).map_err(|e| e.to_string())
}

fn parse_reference_voltage(s: &str) -> Result<f32, String> {
    let volts = s
        .parse::<f32>()
        .map_err(|e| format!("Invalid voltage format: {e}"))?;
    if !volts.is_finite() || volts <= 0.0 {
        return Err(format!("Reference voltage must be positive, got {volts}"));
    }
    Ok(volts)
}

#[derive(Parser, Debug)]
#[cfg_attr(not(feature = "raspberry_pi"), allow(dead_code))]
#[command(version, about)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Number of input channels of the chip: 2 (MCP3002), 4 (MCP3004) or 8 (MCP3008).
    #[arg(short, long, default_value = "8", value_parser = parse_model)]
    pub model: Model,

    /// Voltage on the VREF pin, used to scale single-ended readings.
    #[arg(short, long, default_value_t = mcp300::DEFAULT_REFERENCE_VOLTAGE, value_parser = parse_reference_voltage)]
    pub reference_voltage: f32,

    /// SPI bus index (0 for /dev/spidev0.*).
    #[arg(long, default_value_t = 0)]
    pub bus: u8,

    /// SPI clock rate in Hz.
    /// The MCP300x family tops out between 1.35 MHz (2.7 V) and 3.6 MHz (5 V).
    #[arg(long, default_value_t = 1_000_000, verbatim_doc_comment)]
    pub clock_hz: u32,

    /// BCM GPIO number driving the chip-select line.
    #[arg(long, default_value_t = 5)]
    pub cs_pin: u8,

    /// Channels to sample, comma separated.
    #[arg(short, long, value_delimiter = ',', default_value = "0,1,2")]
    pub channels: Vec<u8>,

    /// Also take a differential reading of every selected channel.
    #[arg(short, long)]
    pub differential: bool,

    /// Interval between sampling rounds (e.g., "500ms", "2s").
    #[arg(value_parser = humantime::parse_duration, short, long, default_value = "2s")]
    pub poll_interval: Duration,

    /// Stop after this many rounds instead of sampling forever.
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["sampler"]).unwrap();

        assert_eq!(args.model, Model::Mcp3008);
        assert_eq!(args.reference_voltage, 3.3);
        assert_eq!(args.clock_hz, 1_000_000);
        assert_eq!(args.channels, [0, 1, 2]);
        assert_eq!(args.poll_interval, Duration::from_secs(2));
        assert!(!args.differential);
        assert_eq!(args.count, None);
    }

    #[test]
    fn explicit_selection() {
        let args = CliArgs::try_parse_from([
            "sampler", "--model", "4", "-c", "1,3", "-d", "-p", "250ms", "-n", "3", "-r", "5.0",
        ])
        .unwrap();

        assert_eq!(args.model, Model::Mcp3004);
        assert_eq!(args.channels, [1, 3]);
        assert!(args.differential);
        assert_eq!(args.poll_interval, Duration::from_millis(250));
        assert_eq!(args.count, Some(3));
        assert_eq!(args.reference_voltage, 5.0);
    }

    #[test]
    fn rejects_unknown_models() {
        for model in ["0", "3", "16", "eight"] {
            assert!(CliArgs::try_parse_from(["sampler", "--model", model]).is_err());
        }
    }

    #[test]
    fn rejects_non_positive_reference() {
        assert!(CliArgs::try_parse_from(["sampler", "-r", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["sampler", "-r", "-3.3"]).is_err());
    }
}
