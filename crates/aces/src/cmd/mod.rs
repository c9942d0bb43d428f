use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use aces_frame::LinkProfile;

use crate::exit::{CliError, CliResult, DATA_INVALID};
use crate::output::OutputFormat;

pub mod decode;
pub mod parity;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run controller, sensor board and a plant model through a scripted start.
    Simulate(SimulateArgs),
    /// Decode one frame as received on a link.
    Decode(DecodeArgs),
    /// Compute parity bytes for 6-byte spans.
    Parity(ParityArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Parity(args) => parity::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// JSON file with `engine` and `link` settings.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Console throttle setting, 0-255.
    #[arg(long, default_value = "180")]
    pub throttle: u8,
    /// Seconds to hold throttle before the console orders a stop.
    #[arg(long, default_value = "5")]
    pub run_secs: u64,
    /// Give up after this many simulated seconds.
    #[arg(long, default_value = "120")]
    pub max_secs: u64,
    /// Run boards on threads over socket pairs in wall-clock time.
    #[arg(long)]
    pub realtime: bool,
}

/// Which board sent the bytes being decoded.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LinkArg {
    Controller,
    Sensor,
    Console,
}

impl From<LinkArg> for LinkProfile {
    fn from(link: LinkArg) -> Self {
        match link {
            LinkArg::Controller => LinkProfile::FromController,
            LinkArg::Sensor => LinkProfile::FromSensor,
            LinkArg::Console => LinkProfile::FromConsole,
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex, opcode first.
    pub hex: String,
    /// Link the frame was received from.
    #[arg(long, value_enum, default_value = "sensor")]
    pub link: LinkArg,
}

#[derive(Args, Debug)]
pub struct ParityArgs {
    /// Data bytes as hex.
    pub hex: String,
    /// Input already ends with its parity bytes; check them.
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse hex input, tolerating whitespace and a `0x` prefix.
pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = input.split_whitespace().collect();
    let digits = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);
    hex::decode(digits).map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex: {err}")))
}
