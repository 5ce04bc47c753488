//! AArch64 (ARM64) interrupt-state backend.
//!
//! Only the IRQ mask bit (DAIF.I) is touched; FIQ, SError and debug
//! exceptions keep whatever state the boot code configured.

use super::Arch;
use core::arch::asm;

/// DAIF.I, set while IRQs are masked.
const DAIF_IRQ_MASK: u64 = 1 << 7;

pub struct Aarch64Arch;

impl Arch for Aarch64Arch {
    #[inline(always)]
    fn enable_interrupts() {
        // SAFETY: Unmasking IRQs has no memory effects. The compiler
        // barrier keeps queue accesses inside the critical section.
        unsafe {
            asm!("msr daifclr, #2", options(nostack));
        }
    }

    #[inline(always)]
    fn disable_interrupts() {
        // SAFETY: Masking IRQs has no memory effects.
        unsafe {
            asm!("msr daifset, #2", options(nostack));
        }
    }

    #[inline(always)]
    fn interrupts_enabled() -> bool {
        let daif: u64;
        // SAFETY: Reading DAIF has no side effects.
        unsafe {
            asm!(
                "mrs {daif}, daif",
                daif = out(reg) daif,
                options(nostack, readonly)
            );
        }
        (daif & DAIF_IRQ_MASK) == 0
    }

    #[inline(always)]
    fn wait_for_interrupt() {
        // WFI wakes on a pending IRQ even while it is masked, so there is
        // no window where an interrupt raised after the queue check is lost.
        // SAFETY: WFI and unmasking IRQs have no memory effects.
        unsafe {
            asm!("wfi", "msr daifclr, #2", options(nostack));
        }
    }
}
