//! Polled UART transmitter used as the debug console backend.
//!
//! The console only needs two things from a UART: try to queue one byte,
//! and tell whether the transmitter has drained. [`UartTx`] captures
//! that; [`MiniUart`] implements it for the BCM2837 Mini UART.
//!
//! # Memory Map
//!
//! Peripheral base for BCM2837: 0x3F000000
//! - GPIO base: 0x3F200000
//! - Mini UART base: 0x3F215000

use core::ptr::{read_volatile, write_volatile};

/// Byte-oriented UART transmitter.
pub trait UartTx {
    /// Try to queue `byte` for transmission.
    ///
    /// Returns `false` without side effects if the transmit buffer is full.
    fn put_byte(&self, byte: u8) -> bool;

    /// Check if the transmit buffer has room for at least one byte.
    fn tx_buffer_is_empty(&self) -> bool;
}

impl<T: UartTx + ?Sized> UartTx for &T {
    fn put_byte(&self, byte: u8) -> bool {
        (**self).put_byte(byte)
    }

    fn tx_buffer_is_empty(&self) -> bool {
        (**self).tx_buffer_is_empty()
    }
}

// GPIO register offsets
const GPFSEL1: usize = 0x04; // GPIO Function Select 1 (pins 10-19)
const GPPUD: usize = 0x94; // GPIO Pull-up/down Enable
const GPPUDCLK0: usize = 0x98; // GPIO Pull-up/down Clock 0

// Mini UART register offsets from the AUX block
const AUX_ENABLES: usize = 0x04;
const AUX_MU_IO: usize = 0x40;
const AUX_MU_IER: usize = 0x44;
const AUX_MU_IIR: usize = 0x48;
const AUX_MU_LCR: usize = 0x4C;
const AUX_MU_MCR: usize = 0x50;
const AUX_MU_LSR: usize = 0x54;
const AUX_MU_CNTL: usize = 0x60;
const AUX_MU_BAUD: usize = 0x68;

/// LSR bit 5: transmitter can accept at least one byte.
const LSR_TX_EMPTY: u32 = 1 << 5;

/// BCM2837 default peripheral bases.
pub const BCM2837_GPIO_BASE: usize = 0x3F20_0000;
pub const BCM2837_AUX_BASE: usize = 0x3F21_5000;

/// BCM2837 Mini UART.
pub struct MiniUart {
    aux_base: usize,
    gpio_base: usize,
}

impl MiniUart {
    /// Create a handle for the Mini UART at the given register blocks.
    ///
    /// # Safety
    ///
    /// `aux_base` and `gpio_base` must be the mapped AUX and GPIO register
    /// blocks, and no other code may drive the Mini UART concurrently.
    pub const unsafe fn new(aux_base: usize, gpio_base: usize) -> Self {
        Self {
            aux_base,
            gpio_base,
        }
    }

    #[inline]
    fn aux(&self, offset: usize) -> *mut u32 {
        (self.aux_base + offset) as *mut u32
    }

    #[inline]
    fn gpio(&self, offset: usize) -> *mut u32 {
        (self.gpio_base + offset) as *mut u32
    }

    /// Initialize the Mini UART for 115200 baud, 8N1, TX and RX enabled.
    ///
    /// # Safety
    ///
    /// Must be called once during board initialization, before the
    /// console is installed. Reconfigures GPIO 14 and 15.
    pub unsafe fn init(&self) {
        // SAFETY: The constructor contract guarantees valid register blocks.
        unsafe {
            write_volatile(self.aux(AUX_ENABLES), 1);
            write_volatile(self.aux(AUX_MU_CNTL), 0);
            write_volatile(self.aux(AUX_MU_IER), 0);
            write_volatile(self.aux(AUX_MU_LCR), 3);
            write_volatile(self.aux(AUX_MU_MCR), 0);
            write_volatile(self.aux(AUX_MU_IIR), 0xC6);
            // 250 MHz / (8 * (270 + 1)) ~= 115200
            write_volatile(self.aux(AUX_MU_BAUD), 270);

            // GPIO 14/15 to ALT5
            let mut gpfsel1 = read_volatile(self.gpio(GPFSEL1));
            gpfsel1 &= !((7 << 12) | (7 << 15));
            gpfsel1 |= (2 << 12) | (2 << 15);
            write_volatile(self.gpio(GPFSEL1), gpfsel1);

            write_volatile(self.gpio(GPPUD), 0);
            delay_cycles(150);
            write_volatile(self.gpio(GPPUDCLK0), (1 << 14) | (1 << 15));
            delay_cycles(150);
            write_volatile(self.gpio(GPPUDCLK0), 0);

            write_volatile(self.aux(AUX_MU_CNTL), 3);
        }
    }
}

/// Spin-wait for approximately `count` CPU cycles.
#[inline]
fn delay_cycles(count: u32) {
    for _ in 0..count {
        core::hint::spin_loop();
    }
}

impl UartTx for MiniUart {
    fn put_byte(&self, byte: u8) -> bool {
        if !self.tx_buffer_is_empty() {
            return false;
        }
        // SAFETY: The constructor contract guarantees a valid register block.
        unsafe { write_volatile(self.aux(AUX_MU_IO), byte as u32) };
        true
    }

    fn tx_buffer_is_empty(&self) -> bool {
        // SAFETY: The constructor contract guarantees a valid register block.
        unsafe { (read_volatile(self.aux(AUX_MU_LSR)) & LSR_TX_EMPTY) != 0 }
    }
}
