//! rmiflash-dummy - In-memory bootloader emulator
//!
//! Emulates the touch controller's register file and block bootloader in
//! memory, behind the same [`FlashTarget`] trait the hidraw backend
//! implements. Useful for development without hardware, and for the
//! protocol tests: every register operation is recorded in a journal so
//! tests can assert ordering properties.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use rmiflash_core::error::{Error, Region, Result};
use rmiflash_core::geometry::DeviceGeometry;
use rmiflash_core::protocol::{cmd, DeviceStatus, DEVICE_RESET, FLASH_STATUS_SUCCESS};
use rmiflash_core::report::RegisterMap;
use rmiflash_core::target::FlashTarget;

/// Configuration and fault injection for the emulator
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Geometry the emulated bootloader reports
    pub geometry: DeviceGeometry,
    /// Register layout the emulator answers on
    pub regs: RegisterMap,
    /// Status reported after a successful unlock
    pub unlock_status: u8,
    /// Status reported after an erase
    pub erase_status: u8,
    /// Report this status instead of success for one block
    pub fail_block: Option<(Region, u32, u8)>,
    /// When false the device never raises attention (timeout testing)
    pub attend: bool,
    /// Running-firmware version bytes
    pub firmware_version: [u8; 3],
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            geometry: DeviceGeometry {
                block_size: 0x20,
                block_count_fw: 0x40,
                block_count_cfg: 0x50,
                bootloader_id: [0xde, 0xad],
            },
            regs: RegisterMap::default(),
            unlock_status: FLASH_STATUS_SUCCESS,
            erase_status: FLASH_STATUS_SUCCESS,
            fail_block: None,
            attend: true,
            firmware_version: [1, 2, 3],
        }
    }
}

/// One observable register operation, in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Block address register pair written while unlocked
    AddressWrite(u16),
    /// One block acknowledged
    BlockWrite {
        /// Region the command addressed
        region: Region,
        /// Block position the write landed on
        index: u32,
    },
    /// Erase-all command
    EraseAll,
    /// Erase-config command
    EraseConfig,
    /// Enable-programming command
    Unlock,
    /// Device reset
    Reset,
}

/// In-memory bootloader emulator
#[cfg(feature = "alloc")]
pub struct DummyRmi {
    config: DummyConfig,
    firmware: Vec<u8>,
    config_region: Vec<u8>,
    erased: bool,
    cfg_erased: bool,
    in_bootloader: bool,
    /// Last write to the block number register pair
    block_number: [u8; 2],
    /// Auto-incrementing block cursor, reset by an address write
    cursor: u32,
    staged: Vec<u8>,
    status: u8,
    attn: bool,
    pending_read: Option<(u16, u16)>,
    journal: Vec<Event>,
}

#[cfg(feature = "alloc")]
impl DummyRmi {
    /// Create an emulator with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let fw_len = config.geometry.firmware_size() as usize;
        let cfg_len = config.geometry.config_size() as usize;
        Self {
            firmware: vec![0xff; fw_len],
            config_region: vec![0xff; cfg_len],
            erased: false,
            cfg_erased: false,
            in_bootloader: false,
            block_number: [0; 2],
            cursor: 0,
            staged: Vec::new(),
            status: FLASH_STATUS_SUCCESS,
            attn: false,
            pending_read: None,
            journal: Vec::new(),
            config,
        }
    }

    /// Create an emulator with the default geometry
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Journal of observed operations
    pub fn journal(&self) -> &[Event] {
        &self.journal
    }

    /// Contents of the emulated firmware region
    pub fn firmware_data(&self) -> &[u8] {
        &self.firmware
    }

    /// Contents of the emulated configuration region
    pub fn config_data(&self) -> &[u8] {
        &self.config_region
    }

    /// Whether the device is currently in bootloader mode
    pub fn in_bootloader(&self) -> bool {
        self.in_bootloader
    }

    fn geometry(&self) -> &DeviceGeometry {
        &self.config.geometry
    }

    fn block_status(&self, region: Region, index: u32) -> u8 {
        match self.config.fail_block {
            Some((r, i, status)) if r == region && i == index => status,
            _ => FLASH_STATUS_SUCCESS,
        }
    }

    fn handle_block_write(&mut self, region: Region) {
        let block_size = usize::from(self.geometry().block_size);
        let (data, count, erased) = match region {
            Region::Firmware => (
                &mut self.firmware,
                self.config.geometry.block_count_fw,
                self.erased,
            ),
            Region::Config => (
                &mut self.config_region,
                self.config.geometry.block_count_cfg,
                self.cfg_erased,
            ),
        };
        let index = self.cursor;
        if !self.in_bootloader
            || !erased
            || index >= u32::from(count)
            || self.staged.len() != block_size
        {
            log::warn!("rejecting {} block {} write", region, index);
            self.status = 0xff;
            self.attn = true;
            return;
        }
        let start = index as usize * block_size;
        data[start..start + block_size].copy_from_slice(&self.staged);

        self.status = self.block_status(region, index);
        if self.status == FLASH_STATUS_SUCCESS {
            self.journal.push(Event::BlockWrite { region, index });
            self.cursor += 1;
        }
        self.attn = true;
    }

    fn handle_flash_command(&mut self, command: u8) {
        match command {
            cmd::ENABLE_PROGRAMMING => {
                if self.block_number == self.geometry().bootloader_id {
                    self.in_bootloader = true;
                    self.status = self.config.unlock_status;
                } else {
                    self.status = 0xfe;
                }
                self.journal.push(Event::Unlock);
            }
            cmd::ERASE_ALL => {
                if self.in_bootloader {
                    self.firmware.fill(0xff);
                    self.config_region.fill(0xff);
                    self.erased = true;
                    self.cfg_erased = true;
                    self.cursor = 0;
                    self.status = self.config.erase_status;
                } else {
                    self.status = 0xfe;
                }
                self.journal.push(Event::EraseAll);
            }
            cmd::ERASE_CONFIG => {
                if self.in_bootloader {
                    self.config_region.fill(0xff);
                    self.cfg_erased = true;
                    self.status = self.config.erase_status;
                } else {
                    self.status = 0xfe;
                }
                self.journal.push(Event::EraseConfig);
            }
            cmd::WRITE_FIRMWARE_BLOCK => self.handle_block_write(Region::Firmware),
            cmd::WRITE_CONFIG_BLOCK => self.handle_block_write(Region::Config),
            _ => {
                self.status = 0xfd;
            }
        }
        self.attn = true;
    }

    fn handle_register_write(&mut self, addr: u16, payload: &[u8]) -> Result<()> {
        let regs = self.config.regs;
        if addr == regs.block_number {
            if payload.len() < 2 {
                return Err(Error::Transport);
            }
            self.block_number = [payload[0], payload[1]];
            if self.in_bootloader {
                let value = u16::from_le_bytes(self.block_number);
                self.cursor = u32::from(value);
                self.journal.push(Event::AddressWrite(value));
            }
        } else if addr == regs.block_data {
            let block_size = usize::from(self.geometry().block_size);
            if payload.len() < block_size {
                return Err(Error::Transport);
            }
            self.staged = payload[..block_size].to_vec();
        } else if addr == regs.flash_command {
            if payload.is_empty() {
                return Err(Error::Transport);
            }
            self.handle_flash_command(payload[0]);
        } else if addr == regs.device_command {
            if payload.first().map(|c| c & DEVICE_RESET) == Some(DEVICE_RESET) {
                self.in_bootloader = false;
                self.erased = false;
                self.cfg_erased = false;
                self.journal.push(Event::Reset);
                self.attn = true;
            }
        } else {
            log::debug!("write to unmapped register 0x{:04x}", addr);
        }
        Ok(())
    }

    fn register_byte(&self, addr: u16) -> u8 {
        let regs = &self.config.regs;
        let g = self.geometry();
        let qb = regs.query_base;

        if addr == regs.flash_command {
            return self.status;
        }
        if addr == regs.device_status {
            let mut status = DeviceStatus::empty();
            if self.in_bootloader {
                status |= DeviceStatus::FLASH_PROG;
            }
            return status.bits();
        }
        if addr >= qb && addr < qb + 2 {
            return g.bootloader_id[usize::from(addr - qb)];
        }
        if addr >= qb + 3 && addr < qb + 5 {
            return g.block_size.to_le_bytes()[usize::from(addr - qb - 3)];
        }
        if addr >= qb + 5 && addr < qb + 7 {
            return g.block_count_fw.to_le_bytes()[usize::from(addr - qb - 5)];
        }
        if addr >= qb + 7 && addr < qb + 9 {
            return g.block_count_cfg.to_le_bytes()[usize::from(addr - qb - 7)];
        }
        if addr >= regs.firmware_version && addr < regs.firmware_version + 3 {
            return self.config.firmware_version[usize::from(addr - regs.firmware_version)];
        }
        0
    }
}

#[cfg(feature = "alloc")]
impl FlashTarget for DummyRmi {
    fn set_feature(&mut self, report: &[u8]) -> Result<()> {
        let regs = self.config.regs;
        match report.first() {
            Some(&id) if id == regs.write_report_id => {
                if report.len() < 3 {
                    return Err(Error::Transport);
                }
                let addr = u16::from_le_bytes([report[1], report[2]]);
                self.handle_register_write(addr, &report[3..])
            }
            Some(&id) if id == regs.read_request_report_id => {
                if report.len() < 5 {
                    return Err(Error::Transport);
                }
                let addr = u16::from_le_bytes([report[1], report[2]]);
                let len = u16::from_le_bytes([report[3], report[4]]);
                self.pending_read = Some((addr, len));
                Ok(())
            }
            _ => Err(Error::Transport),
        }
    }

    fn get_feature(&mut self, report: &mut [u8]) -> Result<usize> {
        let (addr, len) = self.pending_read.take().ok_or(Error::Transport)?;
        let total = 1 + usize::from(len);
        if report.len() < total {
            return Err(Error::Transport);
        }
        report[0] = self.config.regs.read_data_report_id;
        for i in 0..usize::from(len) {
            report[1 + i] = self.register_byte(addr + i as u16);
        }
        Ok(total)
    }

    fn wait_attention(&mut self, _timeout_us: u32) -> Result<bool> {
        if self.attn && self.config.attend {
            self.attn = false;
            return Ok(true);
        }
        Ok(false)
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmiflash_core::error::Phase;
    use rmiflash_core::flasher::{FlashProgress, FlashState, Flasher, NullProgress};
    use rmiflash_core::image::FirmwareImage;
    use rmiflash_core::setup::{self, DeviceMode};

    /// Records every progress report and optionally cancels after a
    /// number of blocks
    #[derive(Default)]
    struct RecordingProgress {
        reports: Vec<(u32, u32)>,
        cancel_after: Option<u32>,
    }

    impl FlashProgress for RecordingProgress {
        fn block_written(&mut self, written: u32, total: u32) {
            self.reports.push((written, total));
        }

        fn cancelled(&self) -> bool {
            match self.cancel_after {
                Some(n) => self.reports.len() as u32 >= n,
                None => false,
            }
        }
    }

    fn patterned(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
    }

    fn block_writes(journal: &[Event]) -> Vec<(Region, u32)> {
        journal
            .iter()
            .filter_map(|e| match e {
                Event::BlockWrite { region, index } => Some((*region, *index)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_setup_reads_geometry() {
        let mut dummy = DummyRmi::new_default();
        let regs = RegisterMap::default();
        let (geometry, mode) = setup::read_device(&mut dummy, &regs).unwrap();
        assert_eq!(geometry, DummyConfig::default().geometry);
        assert_eq!(mode, DeviceMode::Normal);
        assert_eq!(setup::firmware_version(&mut dummy, &regs).unwrap(), "1.2.3");
    }

    #[test]
    fn test_full_flash() {
        let mut dummy = DummyRmi::new_default();
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 1);
        let cfg = patterned(0xa00, 2);
        let image = FirmwareImage::new(&fw, &cfg);

        let mut progress = RecordingProgress::default();
        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        flasher.run(&image, &mut progress).unwrap();
        assert_eq!(flasher.state(), FlashState::Normal);

        // 0x40 + 0x50 blocks, reported monotonically up to (144, 144)
        assert_eq!(progress.reports.len(), 144);
        assert_eq!(progress.reports.last(), Some(&(144, 144)));
        for (i, &(written, total)) in progress.reports.iter().enumerate() {
            assert_eq!(written, i as u32 + 1);
            assert_eq!(total, 144);
        }

        assert_eq!(dummy.firmware_data(), &fw[..]);
        assert_eq!(dummy.config_data(), &cfg[..]);
        assert!(!dummy.in_bootloader());
    }

    #[test]
    fn test_block_ordering() {
        let mut dummy = DummyRmi::new_default();
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut NullProgress)
            .unwrap();

        let writes = block_writes(dummy.journal());
        let first_cfg = writes
            .iter()
            .position(|(r, _)| *r == Region::Config)
            .unwrap();
        // All firmware writes complete before any config write begins
        assert!(writes[..first_cfg]
            .iter()
            .all(|(r, _)| *r == Region::Firmware));
        assert!(writes[first_cfg..].iter().all(|(r, _)| *r == Region::Config));
        // Strictly increasing indices within each region, no gaps
        let fw_indices: Vec<u32> = writes[..first_cfg].iter().map(|(_, i)| *i).collect();
        let cfg_indices: Vec<u32> = writes[first_cfg..].iter().map(|(_, i)| *i).collect();
        assert_eq!(fw_indices, (0..0x40).collect::<Vec<u32>>());
        assert_eq!(cfg_indices, (0..0x50).collect::<Vec<u32>>());

        // Erase happens once, after unlock, before the first write
        let unlock = dummy
            .journal()
            .iter()
            .position(|e| *e == Event::Unlock)
            .unwrap();
        let erase = dummy
            .journal()
            .iter()
            .position(|e| *e == Event::EraseAll)
            .unwrap();
        let first_write = dummy
            .journal()
            .iter()
            .position(|e| matches!(e, Event::BlockWrite { .. }))
            .unwrap();
        assert!(unlock < erase && erase < first_write);
    }

    #[test]
    fn test_address_written_once_per_region() {
        let mut dummy = DummyRmi::new_default();
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut NullProgress)
            .unwrap();

        let addresses: Vec<u16> = dummy
            .journal()
            .iter()
            .filter_map(|e| match e {
                Event::AddressWrite(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(addresses, vec![0, 0]);
    }

    #[test]
    fn test_unlock_failure_stops_before_erase() {
        let mut dummy = DummyRmi::new(DummyConfig {
            unlock_status: 0x42,
            ..DummyConfig::default()
        });
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        let err = flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut NullProgress)
            .unwrap_err();
        assert_eq!(
            err,
            Error::ProtocolStatus {
                phase: Phase::Unlock,
                block: None,
                status: 0x42,
            }
        );
        assert_eq!(flasher.state(), FlashState::Failed);
        assert!(!dummy.journal().contains(&Event::EraseAll));
        assert!(block_writes(dummy.journal()).is_empty());
    }

    #[test]
    fn test_wrong_bootloader_id_rejected() {
        let mut dummy = DummyRmi::new_default();
        let mut geometry = DummyConfig::default().geometry;
        geometry.bootloader_id = [0x00, 0x01];
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        let err = flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut NullProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolStatus {
                phase: Phase::Unlock,
                ..
            }
        ));
    }

    #[test]
    fn test_never_attending_device_times_out() {
        let mut dummy = DummyRmi::new(DummyConfig {
            attend: false,
            ..DummyConfig::default()
        });
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        let err = flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut NullProgress)
            .unwrap_err();
        assert_eq!(err, Error::Timeout { phase: Phase::Unlock });
        assert_eq!(flasher.state(), FlashState::Failed);
    }

    #[test]
    fn test_short_image_touches_no_hardware() {
        let mut dummy = DummyRmi::new_default();
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x7ff, 0);
        let cfg = patterned(0xa00, 0);

        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        let err = flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut NullProgress)
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidImageSize {
                region: Region::Firmware,
                expected: 0x800,
                actual: 0x7ff,
            }
        );
        assert!(dummy.journal().is_empty());
    }

    #[test]
    fn test_block_write_failure_halts() {
        let mut dummy = DummyRmi::new(DummyConfig {
            fail_block: Some((Region::Config, 3, 0xee)),
            ..DummyConfig::default()
        });
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut progress = RecordingProgress::default();
        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        let err = flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut progress)
            .unwrap_err();
        assert_eq!(
            err,
            Error::ProtocolStatus {
                phase: Phase::WriteConfig,
                block: Some(3),
                status: 0xee,
            }
        );
        assert_eq!(flasher.state(), FlashState::Failed);
        // 0x40 firmware blocks plus three config blocks made it through
        assert_eq!(progress.reports.len(), 0x43);
    }

    #[test]
    fn test_cancel_between_blocks_leaves_bootloader() {
        let mut dummy = DummyRmi::new_default();
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut progress = RecordingProgress {
            cancel_after: Some(10),
            ..RecordingProgress::default()
        };
        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        let err = flasher
            .run(&FirmwareImage::new(&fw, &cfg), &mut progress)
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);

        // The caller can still reset the device afterwards
        flasher.attach().unwrap();

        assert_eq!(progress.reports.len(), 10);
        assert_eq!(block_writes(dummy.journal()).len(), 10);
        // Cancellation left the device in bootloader mode until the reset
        assert_eq!(dummy.journal().last(), Some(&Event::Reset));
        assert!(!dummy.in_bootloader());
    }

    #[test]
    fn test_write_requires_erase() {
        let mut dummy = DummyRmi::new_default();
        let geometry = DummyConfig::default().geometry;
        let fw = patterned(0x800, 0);
        let cfg = patterned(0xa00, 0);

        let mut flasher = Flasher::new(&mut dummy, RegisterMap::default(), geometry);
        flasher.detach().unwrap();
        let err = flasher
            .write_firmware(&FirmwareImage::new(&fw, &cfg), &mut NullProgress)
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidState {
                state: FlashState::Erasing,
            }
        );
    }
}
