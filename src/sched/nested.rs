//! Nested work queues.
//!
//! A nested work queue guards a shared resource that can serve one
//! request at a time, e.g. a SPI bus. Tasks that want the resource are
//! parked here and fed one by one into the main work queue. The task
//! holding the resource is the *current* task; it keeps the resource
//! across any number of main-queue round trips until it calls
//! [`NestedWorkQueue::next_task`].

use super::task::Task;
use super::workqueue::WorkQueue;
use crate::arch::{Arch, IrqGuard};
use core::cell::Cell;

/// Per-resource queue with at most one runnable task.
pub struct NestedWorkQueue<'a, A: Arch> {
    wq: WorkQueue<'a, A>,
    current: Cell<Option<&'a Task<'a, A>>>,
    main: &'a WorkQueue<'a, A>,
}

impl<'a, A: Arch> NestedWorkQueue<'a, A> {
    /// Create an idle nested queue feeding `main`.
    pub const fn new(main: &'a WorkQueue<'a, A>) -> Self {
        Self {
            wq: WorkQueue::new(),
            current: Cell::new(None),
            main,
        }
    }

    /// Submit `task` for the resource.
    ///
    /// If the resource is free, `task` becomes current and is added to
    /// the main work queue right away. Otherwise it waits its turn.
    ///
    /// Returns `true` if the task was queued, `false` if it was already
    /// sitting in a queue.
    pub fn add_task(&self, task: &'a Task<'a, A>) -> bool {
        let _irq = IrqGuard::<A>::new();
        if self.current.get().is_some() {
            self.wq.add_task(task)
        } else {
            self.current.set(Some(task));
            self.main.add_task(task)
        }
    }

    /// Hand the resource to the next waiting task.
    ///
    /// Called by the current task when it is done with the resource. The
    /// next waiter becomes current and is added to the main work queue; if
    /// nobody is waiting the resource becomes free.
    pub fn next_task(&self) {
        let _irq = IrqGuard::<A>::new();
        let task = self.wq.pop_task();
        if let Some(task) = task {
            self.main.add_task(task);
        }
        self.current.set(task);
    }

    /// The task currently holding the resource.
    pub fn current(&self) -> Option<&'a Task<'a, A>> {
        self.current.get()
    }

    /// Check if no task holds the resource.
    pub fn is_idle(&self) -> bool {
        self.current.get().is_none()
    }

    /// Number of tasks waiting behind the current one.
    pub fn waiting(&self) -> usize {
        self.wq.len()
    }

    /// The work queue this nested queue feeds.
    pub fn main_queue(&self) -> &'a WorkQueue<'a, A> {
        self.main
    }
}

// SAFETY: `current` and the private queue are only changed with
// interrupts disabled on a single core.
unsafe impl<'a, A: Arch> Sync for NestedWorkQueue<'a, A> {}
