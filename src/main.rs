//! rmiflash - Touch controller firmware flasher
//!
//! Flashes firmware images to RMI-style touch controllers through their
//! block-oriented bootloader, reached over fixed-size HID feature reports.
//!
//! # Architecture
//!
//! The protocol engine lives in `rmiflash-core` and is transport agnostic:
//! it drives any `FlashTarget`, whether that is the Linux hidraw backend
//! or the in-memory dummy emulator. The CLI here only parses arguments,
//! opens the requested target and hands it to the engine.

mod cli;
mod commands;
mod targets;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Info { target } => {
            let mut target = targets::open_target(&target)?;
            commands::info::run_info(&mut target)
        }
        Commands::Flash {
            target,
            input,
            raw,
            tuning,
        } => {
            let mut target = targets::open_target(&target)?;
            commands::flash::run_flash(&mut target, &input, raw, &tuning)
        }
        Commands::Detach { target, tuning } => {
            let mut target = targets::open_target(&target)?;
            commands::flash::run_detach(&mut target, &tuning)
        }
        Commands::Attach { target, tuning } => {
            let mut target = targets::open_target(&target)?;
            commands::flash::run_attach(&mut target, &tuning)
        }
        Commands::ListTargets => {
            commands::list_targets();
            Ok(())
        }
    }
}
