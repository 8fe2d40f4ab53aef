//! Bootloader register protocol
//!
//! Command codes and register-level helpers shared by the state machine
//! and the setup path. The command codes are fixed by the bootloader;
//! the register addresses come from the [`RegisterMap`].

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::report::{self, RegisterMap, MAX_REPORT_LEN};
use crate::target::FlashTarget;

/// Flash command codes written into the flash command register
pub mod cmd {
    /// Program one block of the main firmware region
    pub const WRITE_FIRMWARE_BLOCK: u8 = 0x02;
    /// Erase both flash regions
    pub const ERASE_ALL: u8 = 0x03;
    /// Program one block of the configuration region
    pub const WRITE_CONFIG_BLOCK: u8 = 0x06;
    /// Erase only the configuration region
    pub const ERASE_CONFIG: u8 = 0x07;
    /// Enable flash programming (bits 3:0)
    pub const ENABLE_PROGRAMMING: u8 = 0x0f;
}

/// Reset command, bit 0 of the general device command register
pub const DEVICE_RESET: u8 = 0x01;

/// Status sentinel the bootloader reports after a successful operation
pub const FLASH_STATUS_SUCCESS: u8 = 0x80;

bitflags! {
    /// Device status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceStatus: u8 {
        /// Flash programming is enabled (device is in bootloader mode)
        const FLASH_PROG = 0x40;
        /// Device configuration was lost and must be rewritten
        const UNCONFIGURED = 0x80;
    }
}

/// Write `data` into the register at `addr`
pub fn write_register<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
    addr: u16,
    data: &[u8],
) -> Result<()> {
    let report = report::write_report(map, addr, data)?;
    target.set_feature(&report)
}

/// Read `buf.len()` bytes from the register at `addr`
pub fn read_register<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
    addr: u16,
    buf: &mut [u8],
) -> Result<()> {
    let len = buf.len() as u16;
    let request = report::read_request(map, addr, len)?;
    target.set_feature(&request)?;

    let mut raw = [0u8; MAX_REPORT_LEN];
    // Feature-report convention: the requested report id leads the buffer
    raw[0] = map.read_data_report_id;
    let report_len = usize::from(map.report_len).min(MAX_REPORT_LEN);
    let n = target.get_feature(&mut raw[..report_len])?;
    let data = report::parse_read_data(map, &raw[..n], len)?;
    buf.copy_from_slice(data);
    Ok(())
}

/// Read a single register byte
pub fn read_register_u8<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
    addr: u16,
) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_register(target, map, addr, &mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u16 register pair
pub fn read_register_u16<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
    addr: u16,
) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_register(target, map, addr, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Issue a flash command
pub fn flash_command<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
    command: u8,
) -> Result<()> {
    write_register(target, map, map.flash_command, &[command])
}

/// Read back the flash status from the flash command register
pub fn flash_status<T: FlashTarget + ?Sized>(target: &mut T, map: &RegisterMap) -> Result<u8> {
    read_register_u8(target, map, map.flash_command)
}

/// Wait for attention, then require the success status
///
/// Expiry of the bound is a phase-tagged timeout; any status other than
/// [`FLASH_STATUS_SUCCESS`] is a protocol status error carrying the raw
/// code and, for block writes, the failing block index.
pub fn wait_and_check_status<T: FlashTarget + ?Sized>(
    target: &mut T,
    map: &RegisterMap,
    phase: crate::error::Phase,
    block: Option<u32>,
    timeout_us: u32,
) -> Result<()> {
    if !target.wait_attention(timeout_us)? {
        return Err(Error::Timeout { phase });
    }
    let status = flash_status(target, map)?;
    if status != FLASH_STATUS_SUCCESS {
        return Err(Error::ProtocolStatus {
            phase,
            block,
            status,
        });
    }
    Ok(())
}
