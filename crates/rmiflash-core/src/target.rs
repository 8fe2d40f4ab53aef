//! Flash target trait definition
//!
//! The state machine is handed a [`FlashTarget`] capability instead of
//! subclassing a device base type. Implementations own an exclusive
//! handle to the device control path for the whole detach/write/attach
//! sequence; the engine issues at most one exchange at a time.

use crate::error::Result;

/// Synchronous feature-report control channel to one device
pub trait FlashTarget {
    /// Send one feature report, exactly as laid out by the engine
    fn set_feature(&mut self, report: &[u8]) -> Result<()>;

    /// Receive one feature report into `report`, returning the byte count
    fn get_feature(&mut self, report: &mut [u8]) -> Result<usize>;

    /// Wait up to `timeout_us` for the device's attention signal
    ///
    /// Returns `Ok(true)` once the device has signalled that a requested
    /// register operation completed and status is ready to read, and
    /// `Ok(false)` when the bound expired. The engine turns expiry into
    /// a phase-tagged timeout error; implementations must never block
    /// past the bound.
    fn wait_attention(&mut self, timeout_us: u32) -> Result<bool>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

// Blanket impl for boxed targets to allow trait objects
#[cfg(feature = "alloc")]
impl FlashTarget for alloc::boxed::Box<dyn FlashTarget + Send> {
    fn set_feature(&mut self, report: &[u8]) -> Result<()> {
        (**self).set_feature(report)
    }

    fn get_feature(&mut self, report: &mut [u8]) -> Result<usize> {
        (**self).get_feature(report)
    }

    fn wait_attention(&mut self, timeout_us: u32) -> Result<bool> {
        (**self).wait_attention(timeout_us)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
