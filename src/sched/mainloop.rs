//! The `main()` loop.
//!
//! Drains soft interrupts, then runs one task from the main work queue.
//! With nothing to do it sleeps until the next interrupt. Soft interrupts
//! are polled and the queue is checked with interrupts disabled, so an
//! interrupt arriving after the check wakes the CPU from its sleep instead
//! of being missed.

use super::task::Task;
use super::workqueue::WorkQueue;
use crate::arch::Arch;
use crate::softirq::SoftIrq;

/// Outcome of one [`MainLoop::run_once`] iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    /// A task ran
    Ran,
    /// Nothing was runnable and the CPU slept
    Idle,
}

/// Dispatcher for the main work queue and the soft interrupts.
pub struct MainLoop<'a, A: Arch, const N: usize> {
    queue: &'a WorkQueue<'a, A>,
    softirq: &'a SoftIrq<'a, A, N>,
}

impl<'a, A: Arch, const N: usize> MainLoop<'a, A, N> {
    pub const fn new(queue: &'a WorkQueue<'a, A>, softirq: &'a SoftIrq<'a, A, N>) -> Self {
        Self { queue, softirq }
    }

    /// Run one loop iteration.
    ///
    /// Returns with interrupts enabled.
    pub fn run_once(&self) -> LoopStep {
        A::disable_interrupts();
        self.softirq.poll();

        match self.queue.pop_task() {
            Some(task) => {
                A::enable_interrupts();
                Self::dispatch(task);
                LoopStep::Ran
            }
            None => {
                A::wait_for_interrupt();
                LoopStep::Idle
            }
        }
    }

    /// Run forever.
    pub fn run(&self) -> ! {
        loop {
            self.run_once();
        }
    }

    #[inline]
    fn dispatch(task: &'a Task<'a, A>) {
        task.run();
    }
}
