//! MCP300x sampler
//!
//! Polls an MCP3002/3004/3008 ADC on a fixed interval and prints a block of readings per
//! round: the single-ended code, its voltage and the raw response frame for every
//! selected channel, plus the differential code when asked for.

use anyhow::Result;
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::panic;

mod commandline;
#[cfg(feature = "raspberry_pi")]
mod raspberry_pi;
#[cfg_attr(not(feature = "raspberry_pi"), allow(dead_code))]
mod sampler;

use commandline::CliArgs;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line()))
            .unwrap_or(("<unknown_file>", 0));

        let cause = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(target: "panic", "Panicked at {filename}:{line} - {cause}");
    }));
    log_handle
}

#[cfg(feature = "raspberry_pi")]
fn sample(args: &CliArgs) -> Result<()> {
    let mut adc = raspberry_pi::open(args)?;

    let schedule = sampler::Schedule {
        interval: args.poll_interval,
        count: args.count,
    };

    sampler::run(
        &mut adc,
        &args.channels,
        args.differential,
        schedule,
        std::io::stdout().lock(),
    )
}

#[cfg(not(feature = "raspberry_pi"))]
fn sample(_args: &CliArgs) -> Result<()> {
    anyhow::bail!("No hardware backend available, rebuild with `--features raspberry_pi`")
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let _log_handle = logging_init(args.verbose.log_level_filter());
    trace!("{args:?}");

    sample(&args)
}
