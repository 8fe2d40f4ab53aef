//! Device block geometry
//!
//! The bootloader reports its flash layout as a block size and a block
//! count per region. Everything the engine validates and chunks against
//! comes from this value, read once at setup time and replaced wholesale
//! on re-setup.

use crate::error::{Error, Result};

/// Block geometry and identity reported by the bootloader
///
/// All fields must be populated before any write operation; a zero block
/// size rejects writes with [`Error::InvalidGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGeometry {
    /// Size of one flash block in bytes
    pub block_size: u16,
    /// Number of blocks in the main firmware region
    pub block_count_fw: u16,
    /// Number of blocks in the configuration region
    pub block_count_cfg: u16,
    /// Two-byte bootloader identity, written back to unlock flashing
    pub bootloader_id: [u8; 2],
}

impl DeviceGeometry {
    /// Expected byte length of the main firmware region
    pub fn firmware_size(&self) -> u32 {
        u32::from(self.block_count_fw) * u32::from(self.block_size)
    }

    /// Expected byte length of the configuration region
    pub fn config_size(&self) -> u32 {
        u32::from(self.block_count_cfg) * u32::from(self.block_size)
    }

    /// Total number of blocks across both regions
    pub fn total_blocks(&self) -> u32 {
        u32::from(self.block_count_fw) + u32::from(self.block_count_cfg)
    }

    /// Check that the geometry is usable for flashing
    pub fn check(&self) -> Result<()> {
        if self.block_size == 0 || self.block_count_fw == 0 {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Bootloader version string derived from the identity bytes
    #[cfg(feature = "alloc")]
    pub fn bootloader_version(&self) -> alloc::string::String {
        use alloc::format;
        format!("{}", self.bootloader_id[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> DeviceGeometry {
        DeviceGeometry {
            block_size: 0x20,
            block_count_fw: 0x40,
            block_count_cfg: 0x50,
            bootloader_id: [0xde, 0xad],
        }
    }

    #[test]
    fn test_region_sizes() {
        let g = geometry();
        assert_eq!(g.firmware_size(), 0x800);
        assert_eq!(g.config_size(), 0xa00);
        assert_eq!(g.total_blocks(), 144);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let mut g = geometry();
        g.block_size = 0;
        assert_eq!(g.check(), Err(Error::InvalidGeometry));
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn test_bootloader_version() {
        assert_eq!(geometry().bootloader_version(), "173");
    }
}
