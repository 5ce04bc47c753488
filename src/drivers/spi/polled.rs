//! Polled SPI master.
//!
//! Transfers run from the main work queue instead of the SPI interrupt.
//! Each run of the poll task checks the ready flag at most
//! [`PollConfig::max_loops`] times, moving one byte every time the flag is
//! set. If the budget runs out first, the cursors are saved and the poll
//! task re-queues itself, so other tasks get the CPU between bytes.
//!
//! Only one requester may own the bus at a time. Requesters queue through
//! [`SpiMaster::request_bus`]; the owner is re-queued when each of its
//! transfers completes, and hands the bus over with
//! [`SpiMaster::release_bus`].
//!
//! ```ignore
//! impl<'a> Worker<'a, DefaultArch> for Sensor<'a> {
//!     fn run(&'a self, task: &'a Task<'a, DefaultArch>) {
//!         match self.step.get() {
//!             Step::Start => {
//!                 self.spi.select(&self.device);
//!                 self.spi.write(&READ_SAMPLE);
//!                 self.step.set(Step::Command);
//!             }
//!             Step::Command => {
//!                 self.spi.read(&self.sample);
//!                 self.step.set(Step::Sample);
//!             }
//!             Step::Sample => {
//!                 self.spi.deselect(&self.device);
//!                 self.spi.release_bus();
//!             }
//!         }
//!     }
//! }
//! ```

use super::{ChipSelect, SpiDevice, SpiHw, SpiMode};
use crate::arch::Arch;
use crate::config::PollConfig;
use crate::errors::Status;
use crate::sched::{NestedWorkQueue, Task, WorkQueue, Worker};
use core::cell::Cell;
use portable_atomic::{AtomicU32, Ordering};

/// Which halves of the transfer are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Op {
    read: bool,
    write: bool,
    buf_list: bool,
}

/// Write cursor over plain bytes or bytes filled in at runtime.
#[derive(Debug, Clone, Copy)]
enum TxBuf<'a> {
    Bytes(&'a [u8]),
    Cells(&'a [Cell<u8>]),
}

impl<'a> TxBuf<'a> {
    const EMPTY: Self = TxBuf::Bytes(&[]);

    fn len(self) -> usize {
        match self {
            TxBuf::Bytes(bytes) => bytes.len(),
            TxBuf::Cells(cells) => cells.len(),
        }
    }

    fn first(self) -> Option<u8> {
        match self {
            TxBuf::Bytes(bytes) => bytes.first().copied(),
            TxBuf::Cells(cells) => cells.first().map(Cell::get),
        }
    }

    /// The cursor advanced by one byte.
    fn rest(self) -> Self {
        match self {
            TxBuf::Bytes(bytes) => TxBuf::Bytes(bytes.get(1..).unwrap_or(&[])),
            TxBuf::Cells(cells) => TxBuf::Cells(cells.get(1..).unwrap_or(&[])),
        }
    }
}

/// What the poll task does on its next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Poll,
    NextBuffer,
}

/// Poll task counters.
#[derive(Debug, Default)]
pub struct SpiStats {
    polls: AtomicU32,
    yields: AtomicU32,
}

impl SpiStats {
    /// Counters starting at zero.
    pub const fn new() -> Self {
        Self {
            polls: AtomicU32::new(0),
            yields: AtomicU32::new(0),
        }
    }

    /// Number of poll task runs.
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Number of runs that ran out of budget and re-queued themselves.
    pub fn yields(&self) -> u32 {
        self.yields.load(Ordering::Relaxed)
    }

    /// Zero both counters.
    pub fn reset(&self) {
        self.polls.store(0, Ordering::Relaxed);
        self.yields.store(0, Ordering::Relaxed);
    }
}

/// SPI master driven by polling from the work queue.
pub struct SpiMaster<'a, A: Arch, H: SpiHw> {
    hw: H,
    config: PollConfig,
    nwq: NestedWorkQueue<'a, A>,
    poll_task: Task<'a, A>,
    phase: Cell<Phase>,
    op: Cell<Op>,
    status: Cell<Status>,
    residue: Cell<usize>,
    read: Cell<&'a [Cell<u8>]>,
    write: Cell<TxBuf<'a>>,
    read_list: Cell<&'a [&'a [Cell<u8>]]>,
    write_list: Cell<&'a [&'a [u8]]>,
    stats: SpiStats,
}

impl<'a, A: Arch, H: SpiHw> SpiMaster<'a, A, H> {
    /// Create a master driving `hw`, scheduling its work on `main`.
    pub const fn new(hw: H, main: &'a WorkQueue<'a, A>, config: PollConfig) -> Self {
        Self {
            hw,
            config,
            nwq: NestedWorkQueue::new(main),
            poll_task: Task::new(),
            phase: Cell::new(Phase::Poll),
            op: Cell::new(Op {
                read: false,
                write: false,
                buf_list: false,
            }),
            status: Cell::new(Status::Ok),
            residue: Cell::new(0),
            read: Cell::new(&[]),
            write: Cell::new(TxBuf::EMPTY),
            read_list: Cell::new(&[]),
            write_list: Cell::new(&[]),
            stats: SpiStats::new(),
        }
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    pub fn stats(&self) -> &SpiStats {
        &self.stats
    }

    /// Status of the last transfer.
    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// Bytes left in the buffer being transferred.
    pub fn residue(&self) -> usize {
        self.residue.get()
    }

    /// The nested work queue arbitrating this bus.
    pub fn bus(&self) -> &NestedWorkQueue<'a, A> {
        &self.nwq
    }

    /// Queue `task` for ownership of the bus.
    ///
    /// The task runs once the bus is free. It is run again after each
    /// transfer it starts completes.
    pub fn request_bus(&self, task: &'a Task<'a, A>) -> bool {
        self.nwq.add_task(task)
    }

    /// Hand the bus to the next requester.
    pub fn release_bus(&self) {
        self.nwq.next_task();
    }

    /// Describe a device on this bus.
    pub fn setup_device<C: ChipSelect>(
        &self,
        mode: SpiMode,
        baud_rate: u32,
        cs: C,
    ) -> SpiDevice<H::DeviceRegs, C> {
        SpiDevice::new(mode, baud_rate, self.hw.device_regs(mode, baud_rate), cs)
    }

    /// Load `device`'s settings and assert its chip select.
    pub fn select<C: ChipSelect>(&self, device: &SpiDevice<H::DeviceRegs, C>) {
        self.hw.select_regs(device.regs());
        device.chip_select().select();
    }

    /// Release `device`'s chip select.
    pub fn deselect<C: ChipSelect>(&self, device: &SpiDevice<H::DeviceRegs, C>) {
        device.chip_select().deselect();
        self.hw.deselect_regs(device.regs());
    }

    /// Shift out `data`, discarding what comes back.
    pub fn write(&'a self, data: &'a [u8]) {
        self.start_write(TxBuf::Bytes(data));
    }

    /// Shift out `data`, discarding what comes back.
    ///
    /// For commands built at runtime inside a `&self` structure, e.g. a
    /// command opcode followed by an address.
    pub fn write_cells(&'a self, data: &'a [Cell<u8>]) {
        self.start_write(TxBuf::Cells(data));
    }

    /// Shift in `data.len()` bytes, sending zeros.
    pub fn read(&'a self, data: &'a [Cell<u8>]) {
        self.set_op(false, true, false);
        self.read.set(data);
        self.start(0, data.len());
    }

    /// Send `write` while receiving into `read`.
    ///
    /// # Panics
    ///
    /// Panics if the buffers differ in length.
    pub fn exchange(&'a self, write: &'a [u8], read: &'a [Cell<u8>]) {
        self.start_exchange(TxBuf::Bytes(write), read);
    }

    /// Send `write` while receiving into `read`. The two may overlap.
    ///
    /// # Panics
    ///
    /// Panics if the buffers differ in length.
    pub fn exchange_cells(&'a self, write: &'a [Cell<u8>], read: &'a [Cell<u8>]) {
        self.start_exchange(TxBuf::Cells(write), read);
    }

    /// Shift out every buffer of `list` in order.
    ///
    /// # Panics
    ///
    /// Panics if `list` is empty.
    pub fn write_buf_list(&'a self, list: &'a [&'a [u8]]) {
        let Some((&head, rest)) = list.split_first() else {
            panic!("SPI buffer list is empty");
        };
        self.set_op(true, false, true);
        self.write_list.set(rest);
        let first = self.load_write(TxBuf::Bytes(head));
        self.start(first, head.len());
    }

    /// Fill every buffer of `list` in order.
    ///
    /// # Panics
    ///
    /// Panics if `list` is empty.
    pub fn read_buf_list(&'a self, list: &'a [&'a [Cell<u8>]]) {
        let Some((&head, rest)) = list.split_first() else {
            panic!("SPI buffer list is empty");
        };
        self.set_op(false, true, true);
        self.read_list.set(rest);
        self.read.set(head);
        self.start(0, head.len());
    }

    /// Exchange buffer pairs from `write_list` and `read_list` in order.
    ///
    /// # Panics
    ///
    /// Panics if a list is empty, the lists differ in length, or any pair
    /// of buffers differs in length.
    pub fn exchange_buf_list(&'a self, write_list: &'a [&'a [u8]], read_list: &'a [&'a [Cell<u8>]]) {
        assert!(
            !write_list.is_empty() && !read_list.is_empty(),
            "SPI buffer list is empty"
        );
        assert_eq!(
            write_list.len(),
            read_list.len(),
            "SPI exchange lists differ in length"
        );
        assert!(
            write_list.iter().zip(read_list).all(|(w, r)| w.len() == r.len()),
            "SPI exchange buffers differ in length"
        );

        self.set_op(true, true, true);
        self.write_list.set(&write_list[1..]);
        self.read_list.set(&read_list[1..]);
        self.read.set(read_list[0]);
        let first = self.load_write(TxBuf::Bytes(write_list[0]));
        self.start(first, write_list[0].len());
    }

    fn start_write(&'a self, data: TxBuf<'a>) {
        self.set_op(true, false, false);
        let first = self.load_write(data);
        self.start(first, data.len());
    }

    fn start_exchange(&'a self, write: TxBuf<'a>, read: &'a [Cell<u8>]) {
        assert_eq!(write.len(), read.len(), "SPI exchange buffers differ in length");
        self.set_op(true, true, false);
        self.read.set(read);
        let first = self.load_write(write);
        self.start(first, write.len());
    }

    fn set_op(&self, write: bool, read: bool, buf_list: bool) {
        self.op.set(Op {
            read,
            write,
            buf_list,
        });
    }

    /// Point the write cursor past the first byte and return that byte.
    fn load_write(&self, data: TxBuf<'a>) -> u8 {
        self.write.set(data.rest());
        data.first().unwrap_or(0)
    }

    fn start(&'a self, first: u8, residue: usize) {
        self.poll_task.set_worker(self);
        self.residue.set(residue);
        self.status.set(Status::InProgress);
        self.phase.set(Phase::Poll);
        self.hw.write_data(first);
        self.schedule();
    }

    fn schedule(&'a self) {
        self.nwq.main_queue().add_task(&self.poll_task);
    }

    /// Spend budget until the ready flag is seen.
    #[inline]
    fn wait_ready(&self, budget: &mut u16) -> bool {
        while *budget > 0 {
            *budget -= 1;
            if self.hw.is_ready() {
                return true;
            }
        }
        false
    }

    fn poll(&'a self) {
        self.stats.polls.fetch_add(1, Ordering::Relaxed);

        let op = self.op.get();
        let mut residue = self.residue.get();
        let mut read = self.read.get();
        let mut write = self.write.get();
        let mut budget = self.config.max_loops();

        while residue > 1 {
            let tx = match write.first() {
                Some(byte) if op.write => byte,
                _ => 0,
            };
            if !self.wait_ready(&mut budget) {
                self.yield_poll(residue, read, write);
                return;
            }
            let rx = self.hw.read_data();
            self.hw.write_data(tx);
            residue -= 1;
            if op.read {
                if let Some((cell, rest)) = read.split_first() {
                    cell.set(rx);
                    read = rest;
                }
            }
            if op.write {
                write = write.rest();
            }
        }

        if !self.wait_ready(&mut budget) {
            self.yield_poll(residue, read, write);
            return;
        }
        let rx = self.hw.read_data();
        if op.read {
            if let Some(cell) = read.first() {
                cell.set(rx);
            }
        }

        if op.buf_list {
            self.phase.set(Phase::NextBuffer);
            self.schedule();
        } else {
            self.complete();
        }
    }

    fn yield_poll(&'a self, residue: usize, read: &'a [Cell<u8>], write: TxBuf<'a>) {
        self.stats.yields.fetch_add(1, Ordering::Relaxed);
        self.residue.set(residue);
        self.read.set(read);
        self.write.set(write);
        self.schedule();
    }

    fn next_buffer(&'a self) {
        let op = self.op.get();
        let mut first = 0;
        let mut len = 0;

        if op.read {
            let Some((&next, rest)) = self.read_list.get().split_first() else {
                self.complete();
                return;
            };
            self.read_list.set(rest);
            self.read.set(next);
            len = next.len();
        }
        if op.write {
            let Some((&next, rest)) = self.write_list.get().split_first() else {
                self.complete();
                return;
            };
            self.write_list.set(rest);
            first = self.load_write(TxBuf::Bytes(next));
            len = next.len();
        }

        self.start(first, len);
    }

    fn complete(&self) {
        self.residue.set(0);
        self.status.set(Status::Ok);
        self.nwq.main_queue().add_task(self.nwq.current());
    }
}

impl<'a, A: Arch, H: SpiHw> Worker<'a, A> for SpiMaster<'a, A, H> {
    fn run(&'a self, _task: &'a Task<'a, A>) {
        match self.phase.get() {
            Phase::Poll => self.poll(),
            Phase::NextBuffer => self.next_buffer(),
        }
    }
}

// SAFETY: Transfer state is only touched by the bus owner and the poll
// task, both of which run from main() context on a single core. The queue
// links are protected by the work queues themselves.
unsafe impl<'a, A: Arch, H: SpiHw + Sync> Sync for SpiMaster<'a, A, H> {}
