//! Device setup
//!
//! Read-only discovery of the device geometry and mode from the
//! bootloader query registers. This is a thin data source for the state
//! machine, not protocol logic; the query layout follows the bootloader's
//! register descriptor (identity in queries 0-1, block size in 3-4,
//! firmware block count in 5-6, config block count in 7-8, little endian).

use crate::error::Result;
use crate::geometry::DeviceGeometry;
use crate::protocol::{self, DeviceStatus};
use crate::report::RegisterMap;
use crate::target::FlashTarget;

/// Operating mode at setup time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Normal touch operation
    Normal,
    /// Flash programming already enabled
    Bootloader,
}

/// Read the block geometry from the query registers
pub fn read_geometry<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
) -> Result<DeviceGeometry> {
    let mut bootloader_id = [0u8; 2];
    protocol::read_register(target, map, map.query_base, &mut bootloader_id)?;
    let block_size = protocol::read_register_u16(target, map, map.query_base + 3)?;
    let block_count_fw = protocol::read_register_u16(target, map, map.query_base + 5)?;
    let block_count_cfg = protocol::read_register_u16(target, map, map.query_base + 7)?;

    let geometry = DeviceGeometry {
        block_size,
        block_count_fw,
        block_count_cfg,
        bootloader_id,
    };
    log::debug!(
        "geometry: block_size={} fw_blocks={} cfg_blocks={}",
        block_size,
        block_count_fw,
        block_count_cfg
    );
    Ok(geometry)
}

/// Determine the current operating mode from the device status register
pub fn device_mode<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
) -> Result<DeviceMode> {
    let raw = protocol::read_register_u8(target, map, map.device_status)?;
    let status = DeviceStatus::from_bits_truncate(raw);
    if status.contains(DeviceStatus::FLASH_PROG) {
        Ok(DeviceMode::Bootloader)
    } else {
        Ok(DeviceMode::Normal)
    }
}

/// Read geometry and mode in one pass, rejecting unusable geometry
pub fn read_device<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
) -> Result<(DeviceGeometry, DeviceMode)> {
    let geometry = read_geometry(target, map)?;
    geometry.check()?;
    let mode = device_mode(target, map)?;
    Ok((geometry, mode))
}

/// Running-firmware version string, meaningful outside bootloader mode
///
/// Format and source are device specific; this reads the conventional
/// three version bytes and renders them as a triplet.
#[cfg(feature = "alloc")]
pub fn firmware_version<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
) -> Result<alloc::string::String> {
    use alloc::format;

    let mut ver = [0u8; 3];
    protocol::read_register(target, map, map.firmware_version, &mut ver)?;
    Ok(format!("{}.{}.{}", ver[0], ver[1], ver[2]))
}
