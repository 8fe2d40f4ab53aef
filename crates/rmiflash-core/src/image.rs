//! Firmware image validation
//!
//! The engine is handed two already-separated byte buffers by the
//! container collaborator. Both must match the device-reported geometry
//! exactly before any register is touched; there is no partial acceptance.

use crate::error::{Error, Region, Result};
use crate::geometry::DeviceGeometry;

/// The two independent payloads of a firmware update
#[derive(Debug, Clone, Copy)]
pub struct FirmwareImage<'a> {
    /// Main firmware region payload
    pub firmware: &'a [u8],
    /// Configuration region payload
    pub config: &'a [u8],
}

impl<'a> FirmwareImage<'a> {
    /// Wrap two region payloads
    pub fn new(firmware: &'a [u8], config: &'a [u8]) -> Self {
        Self { firmware, config }
    }

    /// Check both region lengths against the device geometry
    ///
    /// Side-effect free. Fails with [`Error::InvalidImageSize`] naming the
    /// offending region; must be called before any hardware access.
    pub fn validate(&self, geometry: &DeviceGeometry) -> Result<()> {
        geometry.check()?;
        let expected_fw = geometry.firmware_size();
        if self.firmware.len() as u32 != expected_fw {
            return Err(Error::InvalidImageSize {
                region: Region::Firmware,
                expected: expected_fw,
                actual: self.firmware.len() as u32,
            });
        }
        let expected_cfg = geometry.config_size();
        if self.config.len() as u32 != expected_cfg {
            return Err(Error::InvalidImageSize {
                region: Region::Config,
                expected: expected_cfg,
                actual: self.config.len() as u32,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    fn geometry() -> DeviceGeometry {
        DeviceGeometry {
            block_size: 0x20,
            block_count_fw: 0x40,
            block_count_cfg: 0x50,
            bootloader_id: [0xde, 0xad],
        }
    }

    #[test]
    fn test_exact_sizes_accepted() {
        let fw = vec![0u8; 0x800];
        let cfg = vec![0u8; 0xa00];
        assert!(FirmwareImage::new(&fw, &cfg).validate(&geometry()).is_ok());
    }

    #[test]
    fn test_short_firmware_rejected() {
        let fw = vec![0u8; 0x7ff];
        let cfg = vec![0u8; 0xa00];
        assert_eq!(
            FirmwareImage::new(&fw, &cfg).validate(&geometry()),
            Err(Error::InvalidImageSize {
                region: Region::Firmware,
                expected: 0x800,
                actual: 0x7ff,
            })
        );
    }

    #[test]
    fn test_long_config_rejected() {
        let fw = vec![0u8; 0x800];
        let cfg = vec![0u8; 0xa01];
        assert_eq!(
            FirmwareImage::new(&fw, &cfg).validate(&geometry()),
            Err(Error::InvalidImageSize {
                region: Region::Config,
                expected: 0xa00,
                actual: 0xa01,
            })
        );
    }

    #[test]
    fn test_zero_block_size_is_configuration_error() {
        let mut g = geometry();
        g.block_size = 0;
        let empty: [u8; 0] = [];
        assert_eq!(
            FirmwareImage::new(&empty, &empty).validate(&g),
            Err(Error::InvalidGeometry)
        );
    }
}
