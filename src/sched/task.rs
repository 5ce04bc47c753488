//! Work queue tasks and the worker trait.

use crate::arch::Arch;
use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;

/// Code run when a [`Task`] reaches the head of a work queue.
///
/// A worker is usually the structure that embeds the task (a driver, a
/// device client, an application state machine). Its `run` receives the
/// task that fired, so a worker owning several tasks can tell them apart.
pub trait Worker<'a, A: Arch> {
    /// Do one step of work.
    ///
    /// The task is unlinked before this is called, so re-adding it to a
    /// queue from here is allowed and is how a worker asks to be run again.
    fn run(&'a self, task: &'a Task<'a, A>);
}

/// One unit of deferred work.
///
/// A task carries a reference to its worker and an intrusive link, so it
/// can sit in at most one queue at a time without any allocation. It is
/// embedded in whatever owns it and lives as long as its owner.
pub struct Task<'a, A: Arch> {
    worker: Cell<Option<&'a dyn Worker<'a, A>>>,
    pub(crate) next: Cell<Option<&'a Task<'a, A>>>,
    pub(crate) queued: Cell<bool>,
    _arch: PhantomData<A>,
}

impl<'a, A: Arch> Task<'a, A> {
    /// Create a task with no worker bound yet.
    ///
    /// Bind one with [`set_worker`](Self::set_worker) before queuing.
    pub const fn new() -> Self {
        Self {
            worker: Cell::new(None),
            next: Cell::new(None),
            queued: Cell::new(false),
            _arch: PhantomData,
        }
    }

    /// Create a task bound to `worker`.
    pub const fn with_worker(worker: &'a dyn Worker<'a, A>) -> Self {
        Self {
            worker: Cell::new(Some(worker)),
            next: Cell::new(None),
            queued: Cell::new(false),
            _arch: PhantomData,
        }
    }

    /// Change the worker of this task.
    ///
    /// Safe to call while the task is queued; the new worker runs when
    /// the task is popped.
    pub fn set_worker(&self, worker: &'a dyn Worker<'a, A>) {
        self.worker.set(Some(worker));
    }

    /// Check if a worker is bound.
    pub fn has_worker(&self) -> bool {
        self.worker.get().is_some()
    }

    /// Check if the task sits in some work queue.
    pub fn is_queued(&self) -> bool {
        self.queued.get()
    }

    /// Run the task's worker.
    ///
    /// # Panics
    ///
    /// Panics if no worker is bound.
    pub fn run(&'a self) {
        match self.worker.get() {
            Some(worker) => worker.run(self),
            None => panic!("work queue task has no worker"),
        }
    }
}

impl<'a, A: Arch> Default for Task<'a, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, A: Arch> fmt::Debug for Task<'a, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("has_worker", &self.has_worker())
            .field("queued", &self.is_queued())
            .finish()
    }
}

// SAFETY: Tasks are only linked, unlinked and re-bound with interrupts
// disabled on a single core, which is the only way interrupt handlers and
// main() could otherwise race on the cells.
unsafe impl<'a, A: Arch> Sync for Task<'a, A> {}

/// Run a task that was popped from a work queue.
#[inline]
pub fn run_task<'a, A: Arch>(task: &'a Task<'a, A>) {
    task.run();
}
