//! spishim - write-only Linux spidev tool
//!
//! Thin command line front end for `spishim-linux-spi`: opens
//! `/dev/spidevX.Y` and sends a payload in a single transfer.

mod cli;

use clap::Parser;
use cli::{log_level, Cli, Commands};
use spishim_linux_spi::{SpiDevice, DEFAULT_SPEED_HZ};

/// Logger whose default filter follows the `-v` count; RUST_LOG still wins
fn logger_builder(env: env_logger::Env<'_>, verbose: u8) -> env_logger::Builder {
    let level = log_level(verbose).to_string().to_lowercase();
    env_logger::Builder::from_env(env.default_filter_or(level))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logger_builder(env_logger::Env::default(), cli.verbose).init();

    match cli.command {
        Commands::Write {
            device,
            speed,
            input,
            bytes,
        } => {
            let payload = match input {
                Some(path) => std::fs::read(&path)?,
                None => bytes,
            };
            if payload.is_empty() {
                return Err("Nothing to write".into());
            }

            let mut spi = SpiDevice::open(&device.config(speed))?;
            if payload.len() > spi.max_transfer_len() {
                log::warn!(
                    "Payload of {} bytes exceeds the kernel buffer ({} bytes)",
                    payload.len(),
                    spi.max_transfer_len()
                );
            }
            spi.write(&payload)?;
            log::info!("Wrote {} bytes to {}", payload.len(), spi.path().display());
        }
        Commands::Info { device } => {
            let spi = SpiDevice::open(&device.config(DEFAULT_SPEED_HZ))?;
            print_device_info(&spi);
        }
    }

    Ok(())
}

fn print_device_info(spi: &SpiDevice) {
    let xfer = spi.descriptor();
    println!("Device:        {}", spi.path().display());
    println!("Bus:           {}", spi.bus());
    println!("Chip select:   {}", spi.chip_select());
    println!("Speed:         {} Hz", xfer.speed_hz());
    println!("Bits per word: {}", xfer.bits_per_word());
    println!("Max transfer:  {} bytes", spi.max_transfer_len());
}
