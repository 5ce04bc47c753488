//! Soft interrupts.
//!
//! Soft interrupts are virtual interrupts defined, raised and handled by
//! software. They run below hardware interrupts but above work queue
//! tasks: the main loop drains every pending soft interrupt before it runs
//! the next task. Lower ids are drained first.
//!
//! Raising is a single atomic bit set, so interrupt handlers can raise
//! freely. Raising an id that is already pending has no further effect.

use crate::arch::Arch;
use crate::config::SOFTIRQ_MAX_IDS;
use crate::errors::{Result, SoftIrqError};
use core::cell::Cell;
use core::marker::PhantomData;
use portable_atomic::{AtomicU32, Ordering};

/// A soft interrupt identifier.
///
/// Applications usually declare an enum of their soft interrupts and
/// implement this for it. The id doubles as priority: lower runs first.
pub trait SoftIrqId: Copy {
    /// Position in the handler table.
    fn index(self) -> usize;
}

impl SoftIrqId for usize {
    fn index(self) -> usize {
        self
    }
}

/// Soft interrupt handler. Captured state is the handler's data.
pub type SoftIrqHandler<'a> = &'a dyn Fn();

/// Table of `N` soft interrupt handlers plus their pending bitmap.
pub struct SoftIrq<'a, A: Arch, const N: usize> {
    status: AtomicU32,
    table: [Cell<Option<SoftIrqHandler<'a>>>; N],
    _arch: PhantomData<A>,
}

impl<'a, A: Arch, const N: usize> SoftIrq<'a, A, N> {
    const TABLE_FITS_BITMAP: () = assert!(
        N <= SOFTIRQ_MAX_IDS,
        "soft interrupt table larger than the pending bitmap"
    );

    #[allow(clippy::declare_interior_mutable_const)]
    const NO_HANDLER: Cell<Option<SoftIrqHandler<'a>>> = Cell::new(None);

    /// Create a table with no handlers installed and nothing pending.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::TABLE_FITS_BITMAP;
        Self {
            status: AtomicU32::new(0),
            table: [Self::NO_HANDLER; N],
            _arch: PhantomData,
        }
    }

    /// Install `handler` for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside the table.
    pub fn set_handler(&self, id: impl SoftIrqId, handler: SoftIrqHandler<'a>) {
        let index = id.index();
        assert!(index < N, "soft interrupt id {} out of range", index);
        let _irq = crate::arch::IrqGuard::<A>::new();
        self.table[index].set(Some(handler));
    }

    /// Install `handler` for `id`, reporting an out-of-range id.
    pub fn try_set_handler(&self, id: impl SoftIrqId, handler: SoftIrqHandler<'a>) -> Result<()> {
        let index = id.index();
        if index >= N {
            return Err(SoftIrqError::InvalidId(index).into());
        }
        self.set_handler(index, handler);
        Ok(())
    }

    /// Remove the handler for `id`.
    pub fn clear_handler(&self, id: impl SoftIrqId) {
        let index = id.index();
        assert!(index < N, "soft interrupt id {} out of range", index);
        let _irq = crate::arch::IrqGuard::<A>::new();
        self.table[index].set(None);
    }

    /// Flag `id` as pending. Callable from interrupt context.
    ///
    /// The handler is not run here; it runs on the next [`poll`](Self::poll).
    #[inline]
    pub fn raise(&self, id: impl SoftIrqId) {
        let index = id.index();
        assert!(index < N, "soft interrupt id {} out of range", index);
        self.status.fetch_or(1 << index, Ordering::AcqRel);
    }

    /// Check if `id` is pending.
    pub fn is_pending(&self, id: impl SoftIrqId) -> bool {
        let index = id.index();
        index < N && self.status.load(Ordering::Acquire) & (1 << index) != 0
    }

    /// Check if any soft interrupt is pending.
    pub fn any_pending(&self) -> bool {
        self.status.load(Ordering::Acquire) != 0
    }

    /// Run the handlers of all pending soft interrupts, lowest id first.
    ///
    /// Must be called with interrupts disabled. Each pending bit is
    /// cleared before its handler runs, and the handler runs with
    /// interrupts enabled, so it may raise its own id again. Returns the
    /// number of handlers that ran.
    ///
    /// # Panics
    ///
    /// Panics if interrupts are enabled, or a pending id has no handler.
    pub fn poll(&self) -> usize {
        assert!(
            !A::interrupts_enabled(),
            "soft interrupts polled with interrupts enabled"
        );

        let mut handled = 0;
        loop {
            let status = self.status.load(Ordering::Acquire);
            if status == 0 {
                break;
            }
            let id = status.trailing_zeros() as usize;
            self.status.fetch_and(!(1 << id), Ordering::AcqRel);

            A::enable_interrupts();
            match self.table[id].get() {
                Some(handler) => handler(),
                None => panic!("{}", SoftIrqError::NoHandler(id)),
            }
            handled += 1;
            A::disable_interrupts();
        }
        handled
    }
}

impl<'a, A: Arch, const N: usize> Default for SoftIrq<'a, A, N> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: The pending bitmap is atomic. The handler table is only written
// with interrupts disabled on a single core, and read from main() context.
unsafe impl<'a, A: Arch, const N: usize> Sync for SoftIrq<'a, A, N> {}
