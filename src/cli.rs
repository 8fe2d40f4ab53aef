//! CLI argument parsing

use crate::targets;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Generate dynamic help text for the target argument
fn target_help() -> String {
    format!("Target to use [available: {}]", targets::target_names_short())
}

#[derive(Parser)]
#[command(name = "rmiflash")]
#[command(author, version, about = "Touch controller firmware flasher", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Protocol tuning options shared across commands that talk to the device
#[derive(clap::Args, Debug, Clone)]
pub struct TuningArgs {
    /// Attention wait timeout in milliseconds
    #[arg(long, default_value = "500")]
    pub timeout_ms: u32,

    /// Issue a separate config-region erase before writing config blocks
    #[arg(long)]
    pub erase_config: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show device geometry, mode and firmware version
    Info {
        /// Target to use
        #[arg(short, long, help = target_help())]
        target: String,
    },

    /// Flash a firmware image to the device
    Flash {
        /// Target to use
        #[arg(short, long, help = target_help())]
        target: String,

        /// Firmware image file
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the input as raw firmware+config payload without a
        /// container header
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Unlock the bootloader and enable flash programming, nothing more
    Detach {
        /// Target to use
        #[arg(short, long, help = target_help())]
        target: String,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Reset the device back to normal operation
    Attach {
        /// Target to use
        #[arg(short, long, help = target_help())]
        target: String,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// List available targets
    ListTargets,
}
