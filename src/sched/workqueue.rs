//! Interrupt-safe FIFO work queue.
//!
//! Tasks are linked intrusively through their `next` cell, so adding and
//! removing never allocates. Every link update happens inside an
//! [`IrqGuard`], which makes the queue safe to feed from interrupt
//! handlers while `main()` drains it.

use super::task::Task;
use crate::arch::{Arch, IrqGuard};
use core::cell::Cell;
use core::fmt;

/// FIFO of tasks waiting for some resource, usually the CPU.
pub struct WorkQueue<'a, A: Arch> {
    head: Cell<Option<&'a Task<'a, A>>>,
    tail: Cell<Option<&'a Task<'a, A>>>,
}

impl<'a, A: Arch> WorkQueue<'a, A> {
    /// Create an empty work queue.
    pub const fn new() -> Self {
        Self {
            head: Cell::new(None),
            tail: Cell::new(None),
        }
    }

    /// Add `task` to the tail of the queue.
    ///
    /// Returns `true` if the task was queued, `false` if `task` is `None`
    /// or already sits in a queue. Re-adding a queued task is not an
    /// error, so several code paths can re-arm the same task without
    /// coordinating.
    ///
    /// # Panics
    ///
    /// Panics if the task has no worker bound.
    pub fn add_task(&self, task: impl Into<Option<&'a Task<'a, A>>>) -> bool {
        let Some(task) = task.into() else {
            return false;
        };
        assert!(task.has_worker(), "queued task has no worker");

        let _irq = IrqGuard::<A>::new();
        if task.is_queued() {
            return false;
        }
        self.link_tail(task);
        true
    }

    /// Remove and return the task at the head of the queue.
    pub fn pop_task(&self) -> Option<&'a Task<'a, A>> {
        let _irq = IrqGuard::<A>::new();
        let task = self.head.get()?;
        self.head.set(task.next.get());
        if self.head.get().is_none() {
            self.tail.set(None);
        }
        task.next.set(None);
        task.queued.set(false);
        Some(task)
    }

    /// Check if no task is waiting.
    pub fn is_empty(&self) -> bool {
        let _irq = IrqGuard::<A>::new();
        self.head.get().is_none()
    }

    /// Number of waiting tasks.
    pub fn len(&self) -> usize {
        let _irq = IrqGuard::<A>::new();
        let mut count = 0;
        let mut node = self.head.get();
        while let Some(task) = node {
            count += 1;
            node = task.next.get();
        }
        count
    }

    /// Append an unqueued task. Interrupts must be disabled.
    fn link_tail(&self, task: &'a Task<'a, A>) {
        debug_assert!(!A::interrupts_enabled());
        task.next.set(None);
        task.queued.set(true);
        match self.tail.get() {
            Some(tail) => tail.next.set(Some(task)),
            None => self.head.set(Some(task)),
        }
        self.tail.set(Some(task));
    }
}

impl<'a, A: Arch> Default for WorkQueue<'a, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, A: Arch> fmt::Debug for WorkQueue<'a, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue").field("len", &self.len()).finish()
    }
}

// SAFETY: All reads and writes of the link cells happen with interrupts
// disabled on a single core, so interrupt handlers and main() never
// observe a half-updated list.
unsafe impl<'a, A: Arch> Sync for WorkQueue<'a, A> {}
