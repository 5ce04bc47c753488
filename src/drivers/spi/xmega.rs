//! XMEGA SPI controller.
//!
//! # Register Map
//!
//! - 0x00 CTRL: CLK2X(7) ENABLE(6) DORD(5) MASTER(4) MODE(3:2) PRESCALER(1:0)
//! - 0x01 INTCTRL
//! - 0x02 STATUS: IF(7) WRCOL(6)
//! - 0x03 DATA

use super::{SpiHw, SpiMode};
use core::ptr::{read_volatile, write_volatile};

const CTRL: usize = 0x00;
const STATUS: usize = 0x02;
const DATA: usize = 0x03;

const CTRL_CLK2X: u8 = 1 << 7;
const CTRL_ENABLE: u8 = 1 << 6;
const CTRL_MASTER: u8 = 1 << 4;
const CTRL_MODE_SHIFT: u8 = 2;
const CTRL_PRESCALER_MASK: u8 = 0x03;

const STATUS_IF: u8 = 1 << 7;

/// Divider step of the /128 prescaler.
const MAX_DIVIDER_STEP: u8 = 6;

/// XMEGA SPI controller in master mode.
pub struct XmegaSpi {
    base: usize,
    cpu_hz: u32,
}

impl XmegaSpi {
    /// Create a handle for the controller at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the mapped register block of an XMEGA SPI
    /// controller clocked from `cpu_hz`, and no other code may drive it.
    pub const unsafe fn new(base: usize, cpu_hz: u32) -> Self {
        Self { base, cpu_hz }
    }

    #[inline]
    fn reg(&self, offset: usize) -> *mut u8 {
        (self.base + offset) as *mut u8
    }

    #[inline]
    fn read_reg(&self, offset: usize) -> u8 {
        // SAFETY: The constructor contract guarantees a valid register block.
        unsafe { read_volatile(self.reg(offset)) }
    }

    #[inline]
    fn write_reg(&self, offset: usize, value: u8) {
        // SAFETY: The constructor contract guarantees a valid register block.
        unsafe { write_volatile(self.reg(offset), value) }
    }

    /// Enable the controller as master and clear a stale ready flag.
    pub fn init(&self) {
        self.write_reg(CTRL, CTRL_ENABLE | CTRL_MASTER);
        // IF is cleared by reading STATUS followed by DATA.
        self.read_reg(STATUS);
        self.read_reg(DATA);
    }

    /// Disable the controller.
    pub fn disable(&self) {
        self.write_reg(CTRL, 0);
    }

    pub fn is_enabled(&self) -> bool {
        self.read_reg(CTRL) & CTRL_ENABLE != 0
    }
}

/// CTRL value for the fastest clock not above `baud_rate`.
///
/// Step `n` divides the CPU clock by `2 << n`, from 2 up to 128. The
/// prescaler field selects 4, 16, 64 or 128, and CLK2X halves the first
/// three. Requests below `cpu_hz / 128` get the slowest clock.
pub const fn ctrl_for(cpu_hz: u32, mode: SpiMode, baud_rate: u32) -> u8 {
    let ctrl = CTRL_ENABLE | CTRL_MASTER | (mode.bits() << CTRL_MODE_SHIFT);
    let mut prescaled_hz = cpu_hz >> 1;
    let mut step: u8 = 0;

    while step < MAX_DIVIDER_STEP {
        if prescaled_hz <= baud_rate {
            break;
        }
        prescaled_hz >>= 1;
        step += 1;
    }

    if step == MAX_DIVIDER_STEP {
        // CLK2X does not apply to the /128 prescaler
        return ctrl | CTRL_PRESCALER_MASK;
    }
    if step & 1 == 0 {
        ctrl | CTRL_CLK2X | (step >> 1)
    } else {
        ctrl | (step >> 1)
    }
}

impl SpiHw for XmegaSpi {
    type DeviceRegs = u8;

    fn device_regs(&self, mode: SpiMode, baud_rate: u32) -> u8 {
        ctrl_for(self.cpu_hz, mode, baud_rate)
    }

    fn select_regs(&self, ctrl: u8) {
        self.write_reg(CTRL, ctrl);
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.read_reg(STATUS) & STATUS_IF != 0
    }

    #[inline]
    fn read_data(&self) -> u8 {
        self.read_reg(DATA)
    }

    #[inline]
    fn write_data(&self, byte: u8) {
        self.write_reg(DATA, byte)
    }
}
