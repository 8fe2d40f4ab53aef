//! Flash, detach and attach commands

use crate::cli::TuningArgs;

use rmiflash_core::container::FirmwareContainer;
use rmiflash_core::error::Region;
use rmiflash_core::flasher::{EraseScope, FlashConfig, FlashProgress, Flasher};
use rmiflash_core::image::FirmwareImage;
use rmiflash_core::report::RegisterMap;
use rmiflash_core::setup::{self, DeviceMode};
use rmiflash_core::target::FlashTarget;

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

fn flash_config(tuning: &TuningArgs) -> FlashConfig {
    FlashConfig {
        attention_timeout_us: tuning.timeout_ms.saturating_mul(1000),
        erase: if tuning.erase_config {
            EraseScope::PerRegion
        } else {
            EraseScope::All
        },
        ..Default::default()
    }
}

/// Progress sink that feeds an indicatif bar
struct BarProgress {
    bar: ProgressBar,
}

impl FlashProgress for BarProgress {
    fn unlocking(&mut self) {
        self.bar.set_message("unlocking");
    }

    fn erasing(&mut self) {
        self.bar.set_message("erasing");
    }

    fn writing(&mut self, region: Region, blocks: u32) {
        self.bar.set_message(format!("writing {} ({} blocks)", region, blocks));
    }

    fn block_written(&mut self, written: u32, _total: u32) {
        self.bar.set_position(u64::from(written));
    }

    fn resetting(&mut self) {
        self.bar.set_message("resetting");
    }

    fn complete(&mut self) {
        self.bar.finish_with_message("complete");
    }
}

/// Flash a firmware image file to the device
pub fn run_flash<T: FlashTarget>(
    target: &mut T,
    input: &Path,
    raw: bool,
    tuning: &TuningArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    log::info!("Read {} bytes from {}", data.len(), input.display());

    let regs = RegisterMap::default();
    let (geometry, mode) = setup::read_device(target, &regs)?;
    if mode == DeviceMode::Bootloader {
        log::warn!("Device is already in bootloader mode, flashing anyway");
    }

    // Parse up front so a bad image never takes the device down.
    let container;
    let image = if raw {
        let expected = (geometry.firmware_size() + geometry.config_size()) as usize;
        if data.len() != expected {
            return Err(format!(
                "Raw image is {} bytes, device wants {} (firmware {} + config {})",
                data.len(),
                expected,
                geometry.firmware_size(),
                geometry.config_size()
            )
            .into());
        }
        let fw_len = geometry.firmware_size() as usize;
        FirmwareImage::new(&data[..fw_len], &data[fw_len..])
    } else {
        container = FirmwareContainer::parse(&data)?;
        println!("Product id:         {}", container.product_id);
        println!("Build id:           {}", container.build_id);
        println!("Bootloader version: {}", container.bootloader_version);
        container.image()
    };

    let bar = ProgressBar::new(u64::from(geometry.total_blocks()));
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks {msg}",
            )?
            .progress_chars("#>-"),
    );
    let mut progress = BarProgress { bar };

    let mut flasher = Flasher::with_config(target, regs, geometry, flash_config(tuning));
    flasher.run(&image, &mut progress)?;

    println!("Flashed {} blocks", geometry.total_blocks());
    Ok(())
}

/// Unlock the bootloader and enable programming, leaving the device there
pub fn run_detach<T: FlashTarget>(
    target: &mut T,
    tuning: &TuningArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let regs = RegisterMap::default();
    let (geometry, _) = setup::read_device(target, &regs)?;

    let mut flasher = Flasher::with_config(target, regs, geometry, flash_config(tuning));
    flasher.detach()?;

    println!("Device is in bootloader mode");
    Ok(())
}

/// Reset the device back to normal operation
pub fn run_attach<T: FlashTarget>(
    target: &mut T,
    tuning: &TuningArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let regs = RegisterMap::default();
    let (geometry, mode) = setup::read_device(target, &regs)?;
    if mode == DeviceMode::Normal {
        log::info!("Device already in normal mode, resetting anyway");
    }

    let mut flasher = Flasher::with_config(target, regs, geometry, flash_config(tuning));
    flasher.attach()?;

    println!("Device reset to normal mode");
    Ok(())
}
