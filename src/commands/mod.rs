//! CLI command implementations
//!
//! Commands are generic over [`rmiflash_core::target::FlashTarget`] so the
//! same implementations drive both the hidraw backend and the dummy
//! emulator. The target is opened by the dispatch in `targets` and handed
//! in as a boxed trait object.

pub mod flash;
pub mod info;
mod list;

pub use list::list_targets;
