//! Error types for rmiflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::flasher::FlashState;

/// The flash region a block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Main firmware region
    Firmware,
    /// Configuration region
    Config,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firmware => write!(f, "firmware"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// The protocol phase at which a failure was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Bootloader unlock / enable flash programming
    Unlock,
    /// Flash erase
    Erase,
    /// Writing main firmware blocks
    WriteFirmware,
    /// Writing configuration blocks
    WriteConfig,
    /// Device reset back to normal mode
    Reset,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlock => write!(f, "unlock"),
            Self::Erase => write!(f, "erase"),
            Self::WriteFirmware => write!(f, "write-firmware"),
            Self::WriteConfig => write!(f, "write-config"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Control channel send/receive failed; no register state is assumed
    Transport,
    /// Image region length does not match the device geometry
    InvalidImageSize {
        /// Region whose length is wrong
        region: Region,
        /// Expected length (block count * block size)
        expected: u32,
        /// Observed length
        actual: u32,
    },
    /// Geometry is missing or has a zero block size
    InvalidGeometry,
    /// A block payload does not fit into the fixed-size feature report
    ReportTooLong {
        /// Bytes the report would need
        needed: u16,
        /// Fixed report capacity
        capacity: u16,
    },
    /// Attention wait exceeded its bound; device state is unknown
    Timeout {
        /// Phase that was waiting for attention
        phase: Phase,
    },
    /// Device returned a non-success status code
    ProtocolStatus {
        /// Phase at which the status was read
        phase: Phase,
        /// Block index for per-block failures
        block: Option<u32>,
        /// Raw status observed
        status: u8,
    },
    /// Operation is not permitted in the current state machine state
    InvalidState {
        /// State the flasher was in
        state: FlashState,
    },
    /// Caller cancelled between blocks; device is left in bootloader mode
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "control channel transfer failed"),
            Self::InvalidImageSize {
                region,
                expected,
                actual,
            } => write!(
                f,
                "{} image invalid size 0x{:04x} (expected 0x{:04x})",
                region, actual, expected
            ),
            Self::InvalidGeometry => write!(f, "device geometry missing or zero block size"),
            Self::ReportTooLong { needed, capacity } => write!(
                f,
                "register write needs {} bytes but reports are {} bytes",
                needed, capacity
            ),
            Self::Timeout { phase } => {
                write!(f, "timed out waiting for attention during {}", phase)
            }
            Self::ProtocolStatus {
                phase,
                block: Some(idx),
                status,
            } => write!(
                f,
                "device returned status 0x{:02x} for block {} during {}",
                status, idx, phase
            ),
            Self::ProtocolStatus {
                phase,
                block: None,
                status,
            } => write!(f, "device returned status 0x{:02x} during {}", status, phase),
            Self::InvalidState { state } => {
                write!(f, "operation not permitted in state {:?}", state)
            }
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
