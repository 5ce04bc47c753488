//! Cooperative task scheduling.
//!
//! Tasks are run to completion from a FIFO [`WorkQueue`] by the
//! [`MainLoop`]. Shared resources serialize their users through a
//! [`NestedWorkQueue`].

pub mod mainloop;
pub mod nested;
pub mod task;
pub mod workqueue;

pub use mainloop::{LoopStep, MainLoop};
pub use nested::NestedWorkQueue;
pub use task::{run_task, Task, Worker};
pub use workqueue::WorkQueue;

/// Progress of a multi-step job driven by repeated task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More runs are needed; the task has re-queued itself
    Pending,
    /// The job finished
    Done,
}
