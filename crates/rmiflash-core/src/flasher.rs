//! Flash protocol state machine
//!
//! Drives the full detach -> erase -> write -> attach sequence against a
//! [`FlashTarget`]. Every step is a synchronous request/response exchange
//! with a bounded attention wait; any failure abandons the operation and
//! parks the machine in [`FlashState::Failed`]. There is no resume from a
//! midpoint: a retry restarts at unlock with a fresh erase.

use crate::chunk::{chunk, Block};
use crate::error::{Error, Phase, Region, Result};
use crate::geometry::DeviceGeometry;
use crate::image::FirmwareImage;
use crate::protocol::{self, cmd};
use crate::report::{RegisterMap, WRITE_HEADER_LEN};
use crate::target::FlashTarget;

/// States of the flash protocol machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    /// Normal operating mode, nothing in progress
    Normal,
    /// Unlock/enable-programming handshake in flight
    Unlocking,
    /// Unlocked, erase pending or in flight
    Erasing,
    /// Streaming main firmware blocks
    WritingFirmware,
    /// Streaming configuration blocks
    WritingConfig,
    /// Write complete or abandoned, reset pending
    Resetting,
    /// A step failed; the whole sequence must be restarted
    Failed,
}

/// Erase granularity, a configuration point of the bootloader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseScope {
    /// One erase-all command covers both regions
    #[default]
    All,
    /// Erase-all before firmware, erase-config again before config
    PerRegion,
}

/// Tuning knobs for the protocol sequence
#[derive(Debug, Clone, Copy)]
pub struct FlashConfig {
    /// Bound on every attention wait, in microseconds
    pub attention_timeout_us: u32,
    /// Settle delay after reset when no attention arrives
    pub reset_settle_us: u32,
    /// Erase granularity
    pub erase: EraseScope,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            attention_timeout_us: 500_000,
            reset_settle_us: 20_000,
            erase: EraseScope::All,
        }
    }
}

/// Progress sink for a flash operation
///
/// `block_written` is invoked after each successfully acknowledged block,
/// aggregated across both regions (firmware first), monotonically
/// non-decreasing. `cancelled` is polled between blocks; returning `true`
/// stops the stream and leaves the device in bootloader mode.
pub trait FlashProgress {
    /// Bootloader unlock is starting
    fn unlocking(&mut self) {}
    /// Flash erase is starting
    fn erasing(&mut self) {}
    /// Block writes for `region` are starting
    fn writing(&mut self, region: Region, blocks: u32) {
        let _ = (region, blocks);
    }
    /// One more block was acknowledged
    fn block_written(&mut self, written: u32, total: u32) {
        let _ = (written, total);
    }
    /// Device reset is starting
    fn resetting(&mut self) {}
    /// The whole sequence completed
    fn complete(&mut self) {}
    /// Poll for caller cancellation between blocks
    fn cancelled(&self) -> bool {
        false
    }
}

/// Progress sink that discards everything
pub struct NullProgress;

impl FlashProgress for NullProgress {}

/// Accounting for one write invocation, never resumed
#[derive(Debug, Clone, Copy)]
struct ProgramSession {
    total_blocks: u32,
    blocks_written: u32,
    region: Region,
}

impl ProgramSession {
    fn new(total_blocks: u32) -> Self {
        Self {
            total_blocks,
            blocks_written: 0,
            region: Region::Firmware,
        }
    }

    fn advance(&mut self, progress: &mut dyn FlashProgress) {
        self.blocks_written += 1;
        progress.block_written(self.blocks_written, self.total_blocks);
    }
}

/// The flash protocol state machine
///
/// Owns the target handle for the duration of the sequence. The geometry
/// is an explicit value captured at construction; re-setup replaces the
/// whole flasher.
pub struct Flasher<'a, T: FlashTarget> {
    target: &'a mut T,
    regs: RegisterMap,
    geometry: DeviceGeometry,
    config: FlashConfig,
    state: FlashState,
}

impl<'a, T: FlashTarget> Flasher<'a, T> {
    /// Create a flasher with default tuning
    pub fn new(target: &'a mut T, regs: RegisterMap, geometry: DeviceGeometry) -> Self {
        Self::with_config(target, regs, geometry, FlashConfig::default())
    }

    /// Create a flasher with explicit tuning
    pub fn with_config(
        target: &'a mut T,
        regs: RegisterMap,
        geometry: DeviceGeometry,
        config: FlashConfig,
    ) -> Self {
        Self {
            target,
            regs,
            geometry,
            config,
            state: FlashState::Normal,
        }
    }

    /// Current state of the machine
    pub fn state(&self) -> FlashState {
        self.state
    }

    /// Geometry this flasher was built against
    pub fn geometry(&self) -> &DeviceGeometry {
        &self.geometry
    }

    fn expect_state(&self, state: FlashState) -> Result<()> {
        if self.state != state {
            return Err(Error::InvalidState { state: self.state });
        }
        Ok(())
    }

    /// Run one step, parking the machine in `Failed` on any error
    fn step<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        match f(self) {
            Ok(r) => Ok(r),
            Err(e) => {
                self.state = FlashState::Failed;
                Err(e)
            }
        }
    }

    /// Detach: unlock the bootloader and enable flash programming
    ///
    /// Writes the stored bootloader id into the unlock register pair,
    /// sets the enable-programming bits, then waits for attention and
    /// requires the success status.
    pub fn detach(&mut self) -> Result<()> {
        self.expect_state(FlashState::Normal)?;
        self.state = FlashState::Unlocking;
        self.step(|s| {
            log::debug!(
                "unlocking bootloader, id {:02x}{:02x}",
                s.geometry.bootloader_id[0],
                s.geometry.bootloader_id[1]
            );
            let id = s.geometry.bootloader_id;
            protocol::write_register(s.target, &s.regs, s.regs.block_number, &id)?;
            protocol::flash_command(s.target, &s.regs, cmd::ENABLE_PROGRAMMING)?;
            protocol::wait_and_check_status(
                s.target,
                &s.regs,
                Phase::Unlock,
                None,
                s.config.attention_timeout_us,
            )
        })?;
        self.state = FlashState::Erasing;
        Ok(())
    }

    /// Erase the flash, exactly once per session, after a successful unlock
    pub fn erase(&mut self) -> Result<()> {
        self.expect_state(FlashState::Erasing)?;
        self.step(|s| {
            log::debug!("erasing flash");
            protocol::flash_command(s.target, &s.regs, cmd::ERASE_ALL)?;
            protocol::wait_and_check_status(
                s.target,
                &s.regs,
                Phase::Erase,
                None,
                s.config.attention_timeout_us,
            )
        })?;
        self.state = FlashState::WritingFirmware;
        Ok(())
    }

    /// Write both image regions, firmware then configuration
    ///
    /// Requires a completed erase. Progress is reported after each
    /// acknowledged block; the first failure halts the whole operation.
    pub fn write_firmware(
        &mut self,
        image: &FirmwareImage<'_>,
        progress: &mut dyn FlashProgress,
    ) -> Result<()> {
        self.expect_state(FlashState::WritingFirmware)?;
        self.step(|s| s.check_block_fits())?;
        self.step(|s| image.validate(&s.geometry))?;

        let mut session = ProgramSession::new(self.geometry.total_blocks());

        progress.writing(Region::Firmware, u32::from(self.geometry.block_count_fw));
        self.step(|s| {
            s.write_region(
                Region::Firmware,
                image.firmware,
                cmd::WRITE_FIRMWARE_BLOCK,
                &mut session,
                &mut *progress,
            )
        })?;

        self.state = FlashState::WritingConfig;
        session.region = Region::Config;
        if self.config.erase == EraseScope::PerRegion {
            self.step(|s| {
                log::debug!("erasing config region");
                protocol::flash_command(s.target, &s.regs, cmd::ERASE_CONFIG)?;
                protocol::wait_and_check_status(
                    s.target,
                    &s.regs,
                    Phase::Erase,
                    None,
                    s.config.attention_timeout_us,
                )
            })?;
        }

        progress.writing(Region::Config, u32::from(self.geometry.block_count_cfg));
        self.step(|s| {
            s.write_region(
                Region::Config,
                image.config,
                cmd::WRITE_CONFIG_BLOCK,
                &mut session,
                &mut *progress,
            )
        })?;

        self.state = FlashState::Resetting;
        Ok(())
    }

    /// Attach: reset the device back to normal operating mode
    ///
    /// Allowed from any state so a caller can still attempt a reset after
    /// a failure or a cancellation, or rescue a device found stuck in
    /// bootloader mode. The device re-reads its register map on reset;
    /// re-reading geometry is the setup collaborator's job on the next
    /// connect.
    pub fn attach(&mut self) -> Result<()> {
        self.state = FlashState::Resetting;
        self.step(|s| {
            log::debug!("resetting device");
            let reset = [protocol::DEVICE_RESET];
            protocol::write_register(s.target, &s.regs, s.regs.device_command, &reset)?;
            // The original firmware may or may not raise attention for a
            // reset; fall back to a fixed settle delay.
            if !s.target.wait_attention(s.config.attention_timeout_us)? {
                s.target.delay_us(s.config.reset_settle_us);
            }
            Ok(())
        })?;
        self.state = FlashState::Normal;
        Ok(())
    }

    /// Run the full validate -> detach -> erase -> write -> attach sequence
    pub fn run(
        &mut self,
        image: &FirmwareImage<'_>,
        progress: &mut dyn FlashProgress,
    ) -> Result<()> {
        // No hardware is touched until the image checks out.
        image.validate(&self.geometry)?;
        self.check_block_fits()?;

        progress.unlocking();
        self.detach()?;
        progress.erasing();
        self.erase()?;
        self.write_firmware(image, progress)?;
        progress.resetting();
        self.attach()?;
        progress.complete();
        log::info!("flash complete, {} blocks", self.geometry.total_blocks());
        Ok(())
    }

    fn check_block_fits(&self) -> Result<()> {
        let needed = WRITE_HEADER_LEN + usize::from(self.geometry.block_size);
        if needed > usize::from(self.regs.report_len) {
            return Err(Error::ReportTooLong {
                needed: needed as u16,
                capacity: self.regs.report_len,
            });
        }
        Ok(())
    }

    fn write_region(
        &mut self,
        region: Region,
        data: &[u8],
        command: u8,
        session: &mut ProgramSession,
        progress: &mut dyn FlashProgress,
    ) -> Result<()> {
        for block in chunk(data, 0, self.geometry.block_size) {
            if progress.cancelled() {
                log::warn!("cancelled before {} block {}", region, block.index);
                return Err(Error::Cancelled);
            }
            self.write_block(region, &block, command)?;
            session.advance(progress);
        }
        Ok(())
    }

    fn write_block(&mut self, region: Region, block: &Block<'_>, command: u8) -> Result<()> {
        let phase = match region {
            Region::Firmware => Phase::WriteFirmware,
            Region::Config => Phase::WriteConfig,
        };

        // The device auto-increments the block address after each write,
        // so the address register pair is written once per region.
        if block.index == 0 {
            let addr = (block.address & 0xffff) as u16;
            protocol::write_register(
                self.target,
                &self.regs,
                self.regs.block_number,
                &addr.to_le_bytes(),
            )?;
        }
        protocol::write_register(self.target, &self.regs, self.regs.block_data, block.data)?;
        protocol::flash_command(self.target, &self.regs, command)?;
        protocol::wait_and_check_status(
            self.target,
            &self.regs,
            phase,
            Some(block.index),
            self.config.attention_timeout_us,
        )
    }
}
