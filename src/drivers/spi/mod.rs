//! SPI master support.
//!
//! [`SpiHw`] is the register-level view of one SPI controller: a ready
//! flag, a data register, and per-device control settings. The polled
//! master in [`polled`] drives any [`SpiHw`] from the work queue. Chip
//! select lines are board wiring and come in through [`ChipSelect`].

pub mod polled;
pub mod xmega;

pub use polled::{SpiMaster, SpiStats};
pub use xmega::XmegaSpi;

/// Clock polarity and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    /// CPOL = 0, CPHA = 0
    #[default]
    Mode0,
    /// CPOL = 0, CPHA = 1
    Mode1,
    /// CPOL = 1, CPHA = 0
    Mode2,
    /// CPOL = 1, CPHA = 1
    Mode3,
}

impl SpiMode {
    const CPHA: u8 = 1 << 0;
    const CPOL: u8 = 1 << 1;

    /// The mode as `CPOL:CPHA` bits.
    pub const fn bits(self) -> u8 {
        match self {
            SpiMode::Mode0 => 0,
            SpiMode::Mode1 => Self::CPHA,
            SpiMode::Mode2 => Self::CPOL,
            SpiMode::Mode3 => Self::CPOL | Self::CPHA,
        }
    }
}

/// Register access for one SPI controller in master mode.
pub trait SpiHw {
    /// Controller settings for one device, computed once at setup.
    type DeviceRegs: Copy;

    /// Compute the settings for a device clocked at most at `baud_rate`.
    fn device_regs(&self, mode: SpiMode, baud_rate: u32) -> Self::DeviceRegs;

    /// Load a device's settings before it is selected.
    fn select_regs(&self, regs: Self::DeviceRegs);

    /// Undo [`select_regs`](Self::select_regs) after the device is deselected.
    fn deselect_regs(&self, _regs: Self::DeviceRegs) {}

    /// Check if the last byte finished shifting.
    fn is_ready(&self) -> bool;

    /// Read the received byte. Clears the ready flag.
    fn read_data(&self) -> u8;

    /// Start shifting `byte` out.
    fn write_data(&self, byte: u8);
}

/// Chip select line of one SPI device.
pub trait ChipSelect {
    /// Assert the line.
    fn select(&self);

    /// Release the line.
    fn deselect(&self);
}

impl<T: ChipSelect + ?Sized> ChipSelect for &T {
    fn select(&self) {
        (**self).select()
    }

    fn deselect(&self) {
        (**self).deselect()
    }
}

/// An SPI device wired to a master.
#[derive(Debug)]
pub struct SpiDevice<R, C> {
    mode: SpiMode,
    baud_rate: u32,
    regs: R,
    cs: C,
}

impl<R: Copy, C: ChipSelect> SpiDevice<R, C> {
    /// Describe a device using precomputed controller settings.
    ///
    /// Usually obtained through [`SpiMaster::setup_device`].
    pub fn new(mode: SpiMode, baud_rate: u32, regs: R, cs: C) -> Self {
        Self {
            mode,
            baud_rate,
            regs,
            cs,
        }
    }

    /// Clock polarity and phase.
    pub fn mode(&self) -> SpiMode {
        self.mode
    }

    /// Requested maximum clock rate in Hz.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Controller settings loaded on select.
    pub fn regs(&self) -> R {
        self.regs
    }

    /// The device's chip select line.
    pub fn chip_select(&self) -> &C {
        &self.cs
    }
}
