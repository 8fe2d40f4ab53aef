//! Device info command

use rmiflash_core::report::RegisterMap;
use rmiflash_core::setup::{self, DeviceMode};
use rmiflash_core::target::FlashTarget;

/// Read and print the device geometry, mode and versions
pub fn run_info<T: FlashTarget>(target: &mut T) -> Result<(), Box<dyn std::error::Error>> {
    let regs = RegisterMap::default();
    let (geometry, mode) = setup::read_device(target, &regs)?;

    let mode_str = match mode {
        DeviceMode::Normal => "normal",
        DeviceMode::Bootloader => "bootloader",
    };

    println!("Device mode:        {}", mode_str);
    println!(
        "Bootloader id:      {:02x}{:02x} (v{})",
        geometry.bootloader_id[0],
        geometry.bootloader_id[1],
        geometry.bootloader_version()
    );
    println!("Block size:         {} bytes", geometry.block_size);
    println!(
        "Firmware blocks:    {} ({} bytes)",
        geometry.block_count_fw,
        geometry.firmware_size()
    );
    println!(
        "Config blocks:      {} ({} bytes)",
        geometry.block_count_cfg,
        geometry.config_size()
    );

    // Version registers read back as bootloader state once programming is
    // enabled, so only report them in normal mode.
    if mode == DeviceMode::Normal {
        match setup::firmware_version(target, &regs) {
            Ok(version) => println!("Firmware version:   {}", version),
            Err(e) => log::warn!("Could not read firmware version: {}", e),
        }
    }

    Ok(())
}
