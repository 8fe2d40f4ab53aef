//! Linux hidraw device implementation
//!
//! This module provides the `Hidraw` struct that implements the `FlashTarget`
//! trait using Linux's hidraw character device interface.

use crate::error::{HidrawError, Result};

use rmiflash_core::error::{Error as CoreError, Result as CoreResult};
use rmiflash_core::target::FlashTarget;

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsFd;
use std::os::unix::io::AsRawFd;

/// Buffer size used to drain interrupt reports after an attention event
const INTERRUPT_BUF_LEN: usize = 64;

/// Linux hidraw ioctl constants
mod ioctl {
    // HID ioctl magic number
    const HID_IOC_MAGIC: u8 = b'H';

    // HID ioctl type numbers
    const HID_IOC_TYPE_SFEATURE: u8 = 0x06;
    const HID_IOC_TYPE_GFEATURE: u8 = 0x07;

    // HIDIOCSFEATURE/HIDIOCGFEATURE encode the buffer length in the ioctl
    // number, so they cannot use the fixed-size nix macros.
    // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr)
    // with dir = _IOC_WRITE|_IOC_READ = 3
    fn hid_ioc(nr: u8, len: usize) -> libc::c_ulong {
        ((3u32 << 30) | ((len as u32) << 16) | ((HID_IOC_MAGIC as u32) << 8) | (nr as u32))
            as libc::c_ulong
    }

    /// Calculate ioctl number for HIDIOCSFEATURE(len)
    pub fn hidiocsfeature(len: usize) -> libc::c_ulong {
        hid_ioc(HID_IOC_TYPE_SFEATURE, len)
    }

    /// Calculate ioctl number for HIDIOCGFEATURE(len)
    pub fn hidiocgfeature(len: usize) -> libc::c_ulong {
        hid_ioc(HID_IOC_TYPE_GFEATURE, len)
    }
}

/// Configuration for opening a Linux hidraw device
#[derive(Debug, Clone, Default)]
pub struct HidrawConfig {
    /// Device path (e.g., "/dev/hidraw0")
    pub device: String,
}

impl HidrawConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

/// Linux hidraw flash target
///
/// This struct implements the `FlashTarget` trait for Linux systems using
/// the `/dev/hidrawN` device interface. Feature reports are exchanged with
/// the HIDIOCSFEATURE/HIDIOCGFEATURE ioctls and attention is detected by
/// polling the device node for an interrupt report.
pub struct Hidraw {
    /// File handle for the hidraw device
    file: File,
    /// Device path, kept for log messages
    path: String,
}

impl Hidraw {
    /// Open a Linux hidraw device with the given configuration
    pub fn open(config: &HidrawConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(HidrawError::NoDevice);
        }

        log::debug!("hidraw: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| HidrawError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        log::info!("hidraw: Opened {}", config.device);

        Ok(Self {
            file,
            path: config.device.clone(),
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&HidrawConfig::new(device))
    }

    /// Device path this target was opened from
    pub fn path(&self) -> &str {
        &self.path
    }

    fn send_feature(&mut self, report: &[u8]) -> Result<()> {
        if report.is_empty() {
            return Err(HidrawError::InvalidParameter(
                "Feature report cannot be empty".into(),
            ));
        }

        // The kernel takes a mutable buffer even for the send direction
        let mut buf = report.to_vec();
        let fd = self.file.as_raw_fd();
        let ioctl_num = ioctl::hidiocsfeature(buf.len());
        let ret = unsafe { libc::ioctl(fd, ioctl_num, buf.as_mut_ptr()) };

        if ret < 0 {
            return Err(HidrawError::SetFeatureFailed {
                len: report.len(),
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(())
    }

    fn recv_feature(&mut self, report: &mut [u8]) -> Result<usize> {
        if report.is_empty() {
            return Err(HidrawError::InvalidParameter(
                "Feature report buffer cannot be empty".into(),
            ));
        }

        // report[0] carries the requested report id on entry
        let fd = self.file.as_raw_fd();
        let ioctl_num = ioctl::hidiocgfeature(report.len());
        let ret = unsafe { libc::ioctl(fd, ioctl_num, report.as_mut_ptr()) };

        if ret < 0 {
            return Err(HidrawError::GetFeatureFailed(
                std::io::Error::last_os_error(),
            ));
        }

        Ok(ret as usize)
    }

    fn poll_attention(&mut self, timeout_us: u32) -> Result<bool> {
        use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

        let timeout_ms = u16::try_from(timeout_us.div_ceil(1000)).unwrap_or(u16::MAX);
        let timeout = PollTimeout::from(timeout_ms);

        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        let n = poll(&mut fds, timeout).map_err(HidrawError::PollFailed)?;
        if n == 0 {
            return Ok(false);
        }

        // Drain the interrupt report so the next wait starts clean
        let mut buf = [0u8; INTERRUPT_BUF_LEN];
        match (&self.file).read(&mut buf) {
            Ok(len) => log::trace!("hidraw: Drained {} byte interrupt report", len),
            Err(e) => log::warn!("hidraw: Failed to drain interrupt report: {}", e),
        }

        Ok(true)
    }
}

impl FlashTarget for Hidraw {
    fn set_feature(&mut self, report: &[u8]) -> CoreResult<()> {
        self.send_feature(report).map_err(|e| {
            log::error!("hidraw: {}: {}", self.path, e);
            CoreError::Transport
        })
    }

    fn get_feature(&mut self, report: &mut [u8]) -> CoreResult<usize> {
        self.recv_feature(report).map_err(|e| {
            log::error!("hidraw: {}: {}", self.path, e);
            CoreError::Transport
        })
    }

    fn wait_attention(&mut self, timeout_us: u32) -> CoreResult<bool> {
        self.poll_attention(timeout_us).map_err(|e| {
            log::error!("hidraw: {}: {}", self.path, e);
            CoreError::Transport
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Parse target options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<HidrawConfig, String> {
    let mut config = HidrawConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            _ => {
                log::warn!("hidraw: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use dev=/dev/hidrawN".to_string());
    }

    Ok(config)
}
