//! Simulated interrupt backend for host builds and tests.
//!
//! The interrupt-enable flag lives in thread-local storage, so every test
//! thread gets its own simulated CPU. The simulated CPU boots with
//! interrupts enabled.

use super::Arch;
use core::cell::Cell;

std::thread_local! {
    static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
    static SLEEPS: Cell<usize> = const { Cell::new(0) };
    static DISABLES: Cell<usize> = const { Cell::new(0) };
}

/// Host stand-in for a single-core CPU.
pub struct SimArch;

impl SimArch {
    /// Number of times [`Arch::wait_for_interrupt`] was called on this thread.
    pub fn sleep_count() -> usize {
        SLEEPS.with(Cell::get)
    }

    /// Number of times interrupts were disabled on this thread.
    pub fn disable_count() -> usize {
        DISABLES.with(Cell::get)
    }

    /// Reset the simulated CPU to its boot state.
    pub fn reset() {
        IRQ_ENABLED.with(|e| e.set(true));
        SLEEPS.with(|s| s.set(0));
        DISABLES.with(|d| d.set(0));
    }
}

impl Arch for SimArch {
    fn enable_interrupts() {
        IRQ_ENABLED.with(|e| e.set(true));
    }

    fn disable_interrupts() {
        IRQ_ENABLED.with(|e| e.set(false));
        DISABLES.with(|d| d.set(d.get() + 1));
    }

    fn interrupts_enabled() -> bool {
        IRQ_ENABLED.with(Cell::get)
    }

    fn wait_for_interrupt() {
        SLEEPS.with(|s| s.set(s.get() + 1));
        Self::enable_interrupts();
    }
}
