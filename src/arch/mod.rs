//! Architecture abstraction layer for interrupt state and CPU sleep.
//!
//! Everything that mutates shared queue state from `main()` context is
//! bracketed by [`irq_save`] / [`irq_restore`] (or an [`IrqGuard`]), which
//! is the only atomicity primitive the rest of the crate relies on.

use core::marker::PhantomData;
use core::sync::atomic::{compiler_fence, Ordering};

/// Architecture abstraction trait.
///
/// Implemented once per supported CPU. All methods are associated
/// functions because the interrupt-enable flag is a property of the CPU,
/// not of any object.
pub trait Arch {
    /// Enable interrupts on the current CPU.
    fn enable_interrupts();

    /// Disable interrupts on the current CPU.
    fn disable_interrupts();

    /// Check if interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Put the CPU into a low-power state until the next interrupt.
    ///
    /// Called with interrupts disabled. Returns with interrupts enabled,
    /// so the interrupt that woke the CPU gets serviced before the caller
    /// continues.
    fn wait_for_interrupt();
}

/// Saved interrupt-enable state returned by [`irq_save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the saved state must be handed back to irq_restore"]
pub struct IrqFlags {
    enabled: bool,
}

impl IrqFlags {
    /// Whether interrupts were enabled when the state was saved.
    pub fn were_enabled(self) -> bool {
        self.enabled
    }
}

/// Save the interrupt state and disable interrupts.
#[inline]
pub fn irq_save<A: Arch>() -> IrqFlags {
    let enabled = A::interrupts_enabled();
    A::disable_interrupts();
    compiler_fence(Ordering::SeqCst);
    IrqFlags { enabled }
}

/// Restore the interrupt state saved by [`irq_save`].
#[inline]
pub fn irq_restore<A: Arch>(flags: IrqFlags) {
    compiler_fence(Ordering::SeqCst);
    if flags.enabled {
        A::enable_interrupts();
    }
}

/// A critical section which restores the previous interrupt state on drop.
///
/// Guards nest: an inner guard taken with interrupts already disabled
/// leaves them disabled when it is dropped.
pub struct IrqGuard<A: Arch> {
    flags: IrqFlags,
    // Interrupt state belongs to the CPU that saved it.
    _not_send: PhantomData<(A, *const ())>,
}

impl<A: Arch> IrqGuard<A> {
    /// Disable interrupts until the guard is dropped.
    #[inline]
    pub fn new() -> Self {
        Self {
            flags: irq_save::<A>(),
            _not_send: PhantomData,
        }
    }

    /// The state that will be restored on drop.
    pub fn saved(&self) -> IrqFlags {
        self.flags
    }
}

impl<A: Arch> Default for IrqGuard<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch> Drop for IrqGuard<A> {
    #[inline]
    fn drop(&mut self) {
        irq_restore::<A>(self.flags);
    }
}

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(any(test, feature = "std-shim"))]
pub mod host;

pub mod uart;

#[cfg(all(target_arch = "aarch64", not(test)))]
pub use aarch64::Aarch64Arch as DefaultArch;

#[cfg(any(test, all(not(target_arch = "aarch64"), feature = "std-shim")))]
pub use host::SimArch as DefaultArch;

#[cfg(all(not(target_arch = "aarch64"), not(test), not(feature = "std-shim")))]
compile_error!("No interrupt backend for this target. Build for aarch64-unknown-none or enable the std-shim feature for host builds.");
