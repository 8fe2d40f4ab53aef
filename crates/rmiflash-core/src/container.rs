//! Firmware container parsing
//!
//! The vendor ships updates as a single container: a 0x100-byte header
//! followed by the main firmware image and then the configuration image.
//! Parsing separates the two payloads and verifies the header checksum;
//! the protocol engine itself only ever sees the separated buffers.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::image::FirmwareImage;

/// Offset of the firmware payload, immediately after the header
const PAYLOAD_OFFSET: usize = 0x100;

const CHECKSUM_OFFSET: usize = 0x00;
const BOOTLOADER_VERSION_OFFSET: usize = 0x07;
const IMAGE_SIZE_OFFSET: usize = 0x08;
const CONFIG_SIZE_OFFSET: usize = 0x0c;
const PRODUCT_ID_OFFSET: usize = 0x10;
const PRODUCT_ID_LEN: usize = 10;
const BUILD_ID_OFFSET: usize = 0x50;

/// Container parsing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerError {
    /// Data is shorter than the fixed header
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes present
        actual: usize,
    },
    /// Payload does not cover the sizes the header declares
    PayloadMismatch {
        /// Bytes the header declares past the header
        declared: u64,
        /// Payload bytes present
        actual: u64,
    },
    /// Header checksum does not match the contents
    ChecksumMismatch {
        /// Checksum stored in the header
        stored: u32,
        /// Checksum computed over the contents
        computed: u32,
    },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, actual } => write!(
                f,
                "container truncated: {} bytes, header needs {}",
                actual, needed
            ),
            Self::PayloadMismatch { declared, actual } => write!(
                f,
                "container payload is {} bytes but header declares {}",
                actual, declared
            ),
            Self::ChecksumMismatch { stored, computed } => write!(
                f,
                "container checksum mismatch: stored 0x{:08x}, computed 0x{:08x}",
                stored, computed
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ContainerError {}

/// Dual-16-bit one's-complement fold used by the container header
///
/// Public so callers producing containers can seal them the same way.
pub fn container_checksum(data: &[u8]) -> u32 {
    let mut lsw: u32 = 0xffff;
    let mut msw: u32 = 0xffff;
    for pair in data.chunks_exact(2) {
        let word = u32::from(u16::from_le_bytes([pair[0], pair[1]]));
        lsw += word;
        msw += lsw;
        lsw = (lsw & 0xffff) + (lsw >> 16);
        msw = (msw & 0xffff) + (msw >> 16);
    }
    (msw << 16) | lsw
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// A parsed firmware container
#[derive(Debug, Clone)]
pub struct FirmwareContainer {
    /// Bootloader major version the container targets
    pub bootloader_version: u8,
    /// Firmware build id
    pub build_id: u32,
    /// Product id string, NUL-trimmed
    pub product_id: String,
    /// Main firmware payload
    pub firmware: Vec<u8>,
    /// Configuration payload
    pub config: Vec<u8>,
}

impl FirmwareContainer {
    /// Parse and checksum a container
    pub fn parse(data: &[u8]) -> Result<Self, ContainerError> {
        if data.len() < PAYLOAD_OFFSET {
            return Err(ContainerError::Truncated {
                needed: PAYLOAD_OFFSET,
                actual: data.len(),
            });
        }

        let stored = read_u32(data, CHECKSUM_OFFSET);
        let computed = container_checksum(&data[CHECKSUM_OFFSET + 4..]);
        if stored != computed {
            return Err(ContainerError::ChecksumMismatch { stored, computed });
        }

        let image_size = read_u32(data, IMAGE_SIZE_OFFSET) as u64;
        let config_size = read_u32(data, CONFIG_SIZE_OFFSET) as u64;
        let payload = (data.len() - PAYLOAD_OFFSET) as u64;
        if image_size + config_size > payload {
            return Err(ContainerError::PayloadMismatch {
                declared: image_size + config_size,
                actual: payload,
            });
        }

        let fw_start = PAYLOAD_OFFSET;
        let fw_end = fw_start + image_size as usize;
        let cfg_end = fw_end + config_size as usize;

        let raw_id = &data[PRODUCT_ID_OFFSET..PRODUCT_ID_OFFSET + PRODUCT_ID_LEN];
        let id_len = raw_id.iter().position(|&b| b == 0).unwrap_or(raw_id.len());
        let product_id = String::from_utf8_lossy(&raw_id[..id_len]).into_owned();

        Ok(Self {
            bootloader_version: data[BOOTLOADER_VERSION_OFFSET],
            build_id: read_u32(data, BUILD_ID_OFFSET),
            product_id,
            firmware: data[fw_start..fw_end].to_vec(),
            config: data[fw_end..cfg_end].to_vec(),
        })
    }

    /// Borrow the payloads as the engine's image type
    pub fn image(&self) -> FirmwareImage<'_> {
        FirmwareImage::new(&self.firmware, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn build_container(fw: &[u8], cfg: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; PAYLOAD_OFFSET];
        data[BOOTLOADER_VERSION_OFFSET] = 2;
        data[IMAGE_SIZE_OFFSET..IMAGE_SIZE_OFFSET + 4]
            .copy_from_slice(&(fw.len() as u32).to_le_bytes());
        data[CONFIG_SIZE_OFFSET..CONFIG_SIZE_OFFSET + 4]
            .copy_from_slice(&(cfg.len() as u32).to_le_bytes());
        data[PRODUCT_ID_OFFSET..PRODUCT_ID_OFFSET + 6].copy_from_slice(b"TM1234");
        data[BUILD_ID_OFFSET..BUILD_ID_OFFSET + 4].copy_from_slice(&0x1234u32.to_le_bytes());
        data.extend_from_slice(fw);
        data.extend_from_slice(cfg);
        let checksum = container_checksum(&data[4..]);
        data[..4].copy_from_slice(&checksum.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_round_trip() {
        let fw = vec![0xaa; 0x800];
        let cfg = vec![0x55; 0xa00];
        let container = FirmwareContainer::parse(&build_container(&fw, &cfg)).unwrap();
        assert_eq!(container.firmware, fw);
        assert_eq!(container.config, cfg);
        assert_eq!(container.product_id, "TM1234");
        assert_eq!(container.bootloader_version, 2);
        assert_eq!(container.build_id, 0x1234);
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            FirmwareContainer::parse(&[0u8; 0x20]),
            Err(ContainerError::Truncated {
                needed: 0x100,
                actual: 0x20,
            })
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut data = build_container(&[0u8; 0x20], &[0u8; 0x20]);
        data[0x100] ^= 0xff;
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(ContainerError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_payload_shorter_than_declared() {
        let mut data = build_container(&[0u8; 0x20], &[0u8; 0x20]);
        data.truncate(data.len() - 8);
        let checksum = container_checksum(&data[4..]);
        data[..4].copy_from_slice(&checksum.to_le_bytes());
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(ContainerError::PayloadMismatch { .. })
        ));
    }
}
