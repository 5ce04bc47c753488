//! Peripheral drivers built on the work queue.

pub mod at45;
pub mod spi;

pub use at45::At45Device;
pub use spi::{ChipSelect, SpiDevice, SpiHw, SpiMaster, SpiMode};
