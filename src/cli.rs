//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use spishim_linux_spi::{SpiDeviceConfig, DEFAULT_CHIP_SELECT, DEFAULT_SPEED_HZ};
use std::path::PathBuf;

/// Parse a string as a hex or decimal byte
pub fn parse_byte(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex byte '{}': {}", s, e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid byte '{}': {}", s, e))
    }
}

/// Log level for a `-v` count
pub fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[derive(Parser)]
#[command(name = "spishim")]
#[command(author, version, about = "Write-only Linux spidev tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which /dev/spidevX.Y node to use
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DeviceArgs {
    /// SPI bus number (X in /dev/spidevX.Y)
    #[arg(short, long, default_value_t = 0)]
    pub bus: u32,

    /// Chip select (Y in /dev/spidevX.Y)
    #[arg(short = 'c', long = "cs", default_value_t = DEFAULT_CHIP_SELECT)]
    pub chip_select: u8,
}

impl DeviceArgs {
    /// Device configuration at the given clock speed
    pub fn config(&self, speed_hz: u32) -> SpiDeviceConfig {
        SpiDeviceConfig::new(self.bus, speed_hz).with_chip_select(self.chip_select)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send bytes to a spidev device in one transfer
    Write {
        #[command(flatten)]
        device: DeviceArgs,

        /// SPI clock speed in Hz
        #[arg(short, long, default_value_t = DEFAULT_SPEED_HZ)]
        speed: u32,

        /// Read the payload from a file instead of the command line
        #[arg(short, long, conflicts_with = "bytes")]
        input: Option<PathBuf>,

        /// Bytes to send (decimal or 0x-prefixed hex)
        #[arg(value_parser = parse_byte)]
        bytes: Vec<u8>,
    },

    /// Open a spidev device and show its transfer settings
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },
}
