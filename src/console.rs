//! Debug console.
//!
//! Output goes into a small power-of-two ring buffer ([`Stream`]) and is
//! pushed to the hardware by a [`StreamBackend`] when the buffer fills up
//! or a message is complete. [`UartBackend`] drains it through any
//! [`UartTx`], waiting for the transmitter with interrupts restored so a
//! long message does not hold off interrupt handlers.
//!
//! The `dbg_*!` macros print through the console installed with
//! [`install`]. They are compiled out when the `debug-console` feature is
//! off, and messages above [`DEBUG_LEVEL`] are compiled out always.
//!
//! ```ignore
//! use coop_workqueue::arch::uart::{MiniUart, BCM2837_AUX_BASE, BCM2837_GPIO_BASE};
//! use coop_workqueue::console::{self, DebugConsole, UartBackend};
//!
//! static mut CONSOLE: DebugConsole<UartBackend<MiniUart>> = DebugConsole::new(
//!     UartBackend::new(unsafe { MiniUart::new(BCM2837_AUX_BASE, BCM2837_GPIO_BASE) }),
//! );
//!
//! unsafe {
//!     (*core::ptr::addr_of!(CONSOLE)).backend().uart().init();
//!     console::install(&mut *core::ptr::addr_of_mut!(CONSOLE));
//! }
//! coop_workqueue::dbg_info!("booted, {} soft irqs\n", 4);
//! ```

use crate::arch::uart::UartTx;
use crate::arch::{irq_restore, irq_save, Arch, DefaultArch, IrqGuard};
use crate::config::{DEBUG_CONSOLE_BUF_SIZE, DEBUG_LEVEL};
use core::fmt;
use core::marker::PhantomData;
use spin::Mutex;

/// Character ring buffer of `N` bytes. `N` must be a power of two.
pub struct Stream<const N: usize> {
    data: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> Stream<N> {
    const SIZE_IS_POWER_OF_TWO: () = assert!(N.is_power_of_two(), "stream size must be a power of two");
    const MASK: usize = N - 1;

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SIZE_IS_POWER_OF_TWO;
        Self {
            data: [0; N],
            head: 0,
            tail: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes waiting to be extracted.
    pub fn used(&self) -> usize {
        self.head.wrapping_sub(self.tail)
    }

    /// Bytes that can be inserted without extracting any.
    pub fn unused(&self) -> usize {
        N - self.used()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.used() == N
    }

    /// Copy as much of `bytes` as fits, wrapping at the end of the buffer.
    ///
    /// Returns the number of bytes copied.
    pub fn insert(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.unused());
        let start = self.head & Self::MASK;
        let first = count.min(N - start);

        self.data[start..start + first].copy_from_slice(&bytes[..first]);
        self.data[..count - first].copy_from_slice(&bytes[first..count]);
        self.head = self.head.wrapping_add(count);
        count
    }

    /// Remove and return the oldest byte.
    pub fn extract(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.data[self.tail & Self::MASK];
        self.tail = self.tail.wrapping_add(1);
        Some(byte)
    }
}

impl<const N: usize> Default for Stream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware side of a [`Stream`].
pub trait StreamBackend {
    /// Push buffered data towards the hardware.
    fn commit<const N: usize>(&mut self, stream: &mut Stream<N>);

    /// Free at least `goal` bytes in `stream`.
    ///
    /// Returns `false` if that is not possible right now, in which case
    /// the output that did not fit is dropped.
    fn make_room<const N: usize>(&mut self, stream: &mut Stream<N>, goal: usize) -> bool;
}

/// Backend draining the stream into a UART, byte by byte.
pub struct UartBackend<U: UartTx, A: Arch = DefaultArch> {
    uart: U,
    _arch: PhantomData<A>,
}

impl<U: UartTx, A: Arch> UartBackend<U, A> {
    pub const fn new(uart: U) -> Self {
        Self {
            uart,
            _arch: PhantomData,
        }
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }
}

impl<U: UartTx, A: Arch> StreamBackend for UartBackend<U, A> {
    fn commit<const N: usize>(&mut self, stream: &mut Stream<N>) {
        let flags = irq_save::<A>();
        while let Some(byte) = stream.extract() {
            while !self.uart.put_byte(byte) {
                // Wait for the transmitter with the caller's interrupt
                // state, then retry with interrupts off.
                irq_restore::<A>(flags);
                while !self.uart.tx_buffer_is_empty() {
                    core::hint::spin_loop();
                }
                A::disable_interrupts();
            }
        }
        irq_restore::<A>(flags);
    }

    fn make_room<const N: usize>(&mut self, stream: &mut Stream<N>, _goal: usize) -> bool {
        self.commit(stream);
        true
    }
}

/// A text sink the `dbg_*!` macros can print through.
pub trait Console: fmt::Write + Send {
    /// Flush buffered output to the hardware.
    fn commit(&mut self);
}

/// Buffered console writing through backend `B`.
pub struct DebugConsole<B: StreamBackend, const N: usize = DEBUG_CONSOLE_BUF_SIZE, A: Arch = DefaultArch> {
    stream: Stream<N>,
    backend: B,
    _arch: PhantomData<A>,
}

impl<B: StreamBackend, const N: usize, A: Arch> DebugConsole<B, N, A> {
    pub const fn new(backend: B) -> Self {
        Self {
            stream: Stream::new(),
            backend,
            _arch: PhantomData,
        }
    }

    pub fn stream(&self) -> &Stream<N> {
        &self.stream
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Buffer raw bytes, asking the backend for room when full.
    pub fn write_bytes(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.stream.unused() < bytes.len()
                && !self.backend.make_room(&mut self.stream, bytes.len())
            {
                return;
            }

            let copied = {
                let _irq = IrqGuard::<A>::new();
                self.stream.insert(bytes)
            };
            if copied == 0 {
                // The backend claimed room it did not make.
                return;
            }
            bytes = &bytes[copied..];
        }
    }

    /// Buffer one character. `\n` becomes `\r\n`.
    pub fn put_char(&mut self, c: u8) {
        if c == b'\n' {
            self.write_bytes(b"\r\n");
        } else {
            self.write_bytes(&[c]);
        }
    }
}

impl<B: StreamBackend, const N: usize, A: Arch> fmt::Write for DebugConsole<B, N, A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut lines = s.split('\n');
        if let Some(first) = lines.next() {
            self.write_bytes(first.as_bytes());
        }
        for line in lines {
            self.write_bytes(b"\r\n");
            self.write_bytes(line.as_bytes());
        }
        Ok(())
    }
}

impl<B: StreamBackend + Send, const N: usize, A: Arch + Send> Console for DebugConsole<B, N, A> {
    fn commit(&mut self) {
        self.backend.commit(&mut self.stream);
    }
}

static CONSOLE: Mutex<Option<&'static mut dyn Console>> = Mutex::new(None);

/// Make `console` the target of the `dbg_*!` macros.
///
/// Returns the console that was installed before, if any.
pub fn install(console: &'static mut dyn Console) -> Option<&'static mut dyn Console> {
    CONSOLE.lock().replace(console)
}

/// Detach the installed console.
pub fn uninstall() -> Option<&'static mut dyn Console> {
    CONSOLE.lock().take()
}

/// Whether messages of `level` are compiled in.
#[inline]
pub const fn level_enabled(level: u8) -> bool {
    cfg!(feature = "debug-console") && level <= DEBUG_LEVEL
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    // An interrupt handler printing while main() holds the console would
    // spin forever on a single core. Drop the message instead.
    let Some(mut slot) = CONSOLE.try_lock() else {
        return;
    };
    if let Some(console) = slot.as_mut() {
        let _ = fmt::Write::write_fmt(&mut **console, args);
        console.commit();
    }
}

/// Print to the debug console if `level` is enabled.
#[macro_export]
macro_rules! dbg_printf_level {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::console::level_enabled($level) {
            $crate::console::_print(format_args!($($arg)*));
        }
    }};
}

/// Print a verbose message to the debug console.
#[macro_export]
macro_rules! dbg_printf {
    ($($arg:tt)*) => { $crate::dbg_printf_level!($crate::config::level::VERBOSE, $($arg)*) };
}

#[macro_export]
macro_rules! dbg_error {
    ($($arg:tt)*) => { $crate::dbg_printf_level!($crate::config::level::ERROR, $($arg)*) };
}

#[macro_export]
macro_rules! dbg_warning {
    ($($arg:tt)*) => { $crate::dbg_printf_level!($crate::config::level::WARNING, $($arg)*) };
}

#[macro_export]
macro_rules! dbg_info {
    ($($arg:tt)*) => { $crate::dbg_printf_level!($crate::config::level::INFO, $($arg)*) };
}

#[macro_export]
macro_rules! dbg_verbose {
    ($($arg:tt)*) => { $crate::dbg_printf_level!($crate::config::level::VERBOSE, $($arg)*) };
}
