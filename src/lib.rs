#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unreachable_pub)]

//! Cooperative work queue runtime for bare-metal microcontrollers.
//!
//! Interrupt handlers stay short: they raise a soft interrupt or queue a
//! task and return. Everything else runs to completion from `main()`,
//! one task at a time, in the order it was queued. Shared peripherals are
//! serialized by nested work queues instead of locks, and slow hardware is
//! polled by tasks that re-queue themselves instead of blocking.
//!
//! # Features
//!
//! - `debug-console`: Compile in the `dbg_*!` macros (default)
//! - `std-shim`: Simulated interrupt backend for host builds
//!
//! # Quick Start
//!
//! ```ignore
//! use coop_workqueue::{DefaultArch, MainLoop, SoftIrq, Task, WorkQueue, Worker};
//!
//! static MAIN_QUEUE: WorkQueue<'static, DefaultArch> = WorkQueue::new();
//! static SOFTIRQ: SoftIrq<'static, DefaultArch, 4> = SoftIrq::new();
//!
//! struct Blink;
//!
//! impl<'a> Worker<'a, DefaultArch> for Blink {
//!     fn run(&'a self, _task: &'a Task<'a, DefaultArch>) {
//!         toggle_led();
//!     }
//! }
//!
//! static BLINK: Blink = Blink;
//! static BLINK_TASK: Task<'static, DefaultArch> = Task::with_worker(&BLINK);
//!
//! fn timer_irq() {
//!     MAIN_QUEUE.add_task(&BLINK_TASK);
//! }
//!
//! fn kernel_main() -> ! {
//!     MainLoop::new(&MAIN_QUEUE, &SOFTIRQ).run()
//! }
//! ```
//!
//! # Architecture
//!
//! - [`arch`]: interrupt masking and CPU sleep behind the [`Arch`] trait
//! - [`sched`]: tasks, work queues, nested work queues and the main loop
//! - [`softirq`]: software-raised handlers drained before each task
//! - [`drivers`]: the polled SPI master and the AT45 DataFlash client
//! - [`console`]: buffered debug output and the `dbg_*!` macros

#[cfg(any(test, feature = "std-shim"))]
extern crate std;

pub mod arch;
pub mod config;
pub mod console;
pub mod drivers;
pub mod errors;
pub mod sched;
pub mod softirq;

#[cfg(test)]
mod tests;

// Panic handler for bare-metal
#[cfg(all(not(test), not(feature = "std-shim")))]
use core::panic::PanicInfo;

#[cfg(all(not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    // On panic, disable interrupts and halt
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }
    loop {
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{irq_restore, irq_save, Arch, DefaultArch, IrqFlags, IrqGuard};

// Scheduling
pub use sched::{run_task, LoopStep, MainLoop, NestedWorkQueue, Progress, Task, WorkQueue, Worker};

// Soft interrupts
pub use softirq::{SoftIrq, SoftIrqId};

// Configuration
pub use config::PollConfig;

// Errors
pub use errors::{ConfigError, ConfigResult, Error, Result, SoftIrqError, Status};
