//! rmiflash-core - Flash protocol engine for RMI-style touch controllers
//!
//! This crate implements the block-oriented bootloader protocol used by
//! RMI-style touch controller ASICs. The device exposes a register file
//! reached through fixed-size HID feature reports; flashing it means
//! unlocking the bootloader, erasing, streaming fixed-size blocks through
//! a command/acknowledge handshake, and resetting back to normal mode.
//!
//! The crate is `no_std` compatible so the engine can run on embedded
//! hosts as well as on Linux via the hidraw backend.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation (container parsing, version strings)
//!
//! # Example
//!
//! ```ignore
//! use rmiflash_core::{flasher::Flasher, image::FirmwareImage, target::FlashTarget};
//!
//! fn flash<T: FlashTarget>(target: &mut T, fw: &[u8], cfg: &[u8]) {
//!     let (geometry, _mode) = rmiflash_core::setup::read_device(target, &Default::default())
//!         .expect("setup failed");
//!     let image = FirmwareImage::new(fw, cfg);
//!     let mut flasher = Flasher::new(target, Default::default(), geometry);
//!     match flasher.run(&image, &mut rmiflash_core::flasher::NullProgress) {
//!         Ok(()) => println!("flashed"),
//!         Err(e) => println!("flash failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "alloc", test))]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod chunk;
#[cfg(feature = "alloc")]
pub mod container;
pub mod error;
pub mod flasher;
pub mod geometry;
pub mod image;
pub mod protocol;
pub mod report;
pub mod setup;
pub mod target;

pub use error::{Error, Phase, Region, Result};
pub use geometry::DeviceGeometry;
