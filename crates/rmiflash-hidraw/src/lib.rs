//! rmiflash-hidraw - Linux hidraw support
//!
//! This crate provides access to HID touch controllers through the Linux
//! hidraw character device interface at `/dev/hidrawN`.
//!
//! # Overview
//!
//! Feature reports are exchanged with the HIDIOCSFEATURE and HIDIOCGFEATURE
//! ioctls. The controller signals attention by queuing an interrupt report
//! on the device node, which is detected with `poll(2)`.
//!
//! # Example
//!
//! ```no_run
//! use rmiflash_hidraw::Hidraw;
//! use rmiflash_core::setup;
//!
//! let mut dev = Hidraw::open_device("/dev/hidraw0")?;
//! let (geometry, mode) = setup::read_device(&mut dev, &Default::default())?;
//! println!("block size: {:#x} ({:?})", geometry.block_size, mode);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with rmiflash CLI
//!
//! ```bash
//! # Query the device
//! rmiflash info -t hidraw:dev=/dev/hidraw0
//!
//! # Flash a firmware image
//! rmiflash flash -t hidraw:dev=/dev/hidraw0 firmware.img
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with hidraw support enabled (`CONFIG_HIDRAW`)
//! - Read/write access to the `/dev/hidrawN` device node, typically via
//!   udev rules or running as root

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, Hidraw, HidrawConfig};
pub use error::{HidrawError, Result};

/// Open a Linux hidraw device and return a boxed FlashTarget
///
/// This is a convenience function for use in the CLI target dispatch.
///
/// # Arguments
///
/// * `options` - Slice of (key, value) pairs from target string parsing
///
/// # Example Options
///
/// - `dev=/dev/hidraw0` - Required: device path
pub fn open_hidraw(
    options: &[(&str, &str)],
) -> std::result::Result<
    Box<dyn rmiflash_core::target::FlashTarget + Send>,
    Box<dyn std::error::Error>,
> {
    let config = parse_options(options)?;
    let dev = Hidraw::open(&config)?;
    Ok(Box::new(dev))
}
