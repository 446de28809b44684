//! Device boundary.
//!
//! The acquisition loop talks to hardware only through [`ScanDevice`]. Device
//! discovery and initialisation happen outside this crate; callers hand the loop an
//! opened device.

pub mod mock;
pub mod scan_device;

pub use scan_device::{ScanDevice, ScanGuard, ScanOptions, ScanRead};
