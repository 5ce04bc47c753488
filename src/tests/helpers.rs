//! Simulated peripherals and common test utilities.

use crate::arch::uart::UartTx;
use crate::arch::Arch;
use crate::drivers::spi::{ChipSelect, SpiHw, SpiMode};
use crate::sched::{Task, WorkQueue, Worker};
use core::cell::{Cell, RefCell};
use portable_atomic::{AtomicUsize, Ordering};
use spin::Mutex;
use std::collections::VecDeque;
use std::vec::Vec;

/// Run queued tasks until the queue is empty. Returns how many ran.
pub(crate) fn drain<'a, A: Arch>(queue: &WorkQueue<'a, A>) -> usize {
    let mut ran = 0;
    while let Some(task) = queue.pop_task() {
        task.run();
        ran += 1;
    }
    ran
}

/// SPI controller model.
///
/// Every written byte is recorded. Every read returns the next queued
/// response, or 0xff once they run out. The ready flag reads set on every
/// `n`th check.
pub(crate) struct SimSpi {
    sent: RefCell<Vec<u8>>,
    responses: RefCell<VecDeque<u8>>,
    ready_every: Cell<usize>,
    checks: Cell<usize>,
    selected_regs: Cell<Option<u8>>,
}

impl SimSpi {
    pub(crate) fn new() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            responses: RefCell::new(VecDeque::new()),
            ready_every: Cell::new(1),
            checks: Cell::new(0),
            selected_regs: Cell::new(None),
        }
    }

    /// Set the ready flag on every `n`th check only.
    pub(crate) fn ready_every(&self, n: usize) {
        assert!(n > 0);
        self.ready_every.set(n);
    }

    /// Queue bytes to be returned by the data register.
    pub(crate) fn respond(&self, bytes: &[u8]) {
        self.responses.borrow_mut().extend(bytes.iter().copied());
    }

    pub(crate) fn sent(&self) -> Vec<u8> {
        self.sent.borrow().clone()
    }

    pub(crate) fn checks(&self) -> usize {
        self.checks.get()
    }

    pub(crate) fn selected_regs(&self) -> Option<u8> {
        self.selected_regs.get()
    }
}

impl SpiHw for SimSpi {
    type DeviceRegs = u8;

    fn device_regs(&self, mode: SpiMode, _baud_rate: u32) -> u8 {
        mode.bits()
    }

    fn select_regs(&self, regs: u8) {
        self.selected_regs.set(Some(regs));
    }

    fn deselect_regs(&self, _regs: u8) {
        self.selected_regs.set(None);
    }

    fn is_ready(&self) -> bool {
        let checks = self.checks.get() + 1;
        self.checks.set(checks);
        checks % self.ready_every.get() == 0
    }

    fn read_data(&self) -> u8 {
        self.responses.borrow_mut().pop_front().unwrap_or(0xff)
    }

    fn write_data(&self, byte: u8) {
        self.sent.borrow_mut().push(byte);
    }
}

/// Chip select line model.
#[derive(Default)]
pub(crate) struct SimChipSelect {
    selected: Cell<bool>,
    selects: Cell<usize>,
}

impl SimChipSelect {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_selected(&self) -> bool {
        self.selected.get()
    }

    pub(crate) fn selects(&self) -> usize {
        self.selects.get()
    }
}

impl ChipSelect for SimChipSelect {
    fn select(&self) {
        assert!(!self.selected.get(), "chip selected twice");
        self.selected.set(true);
        self.selects.set(self.selects.get() + 1);
    }

    fn deselect(&self) {
        self.selected.set(false);
    }
}

/// UART transmitter model that is busy for a set number of polls.
pub(crate) struct SimUart {
    sent: Mutex<Vec<u8>>,
    busy_polls: AtomicUsize,
}

impl SimUart {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            busy_polls: AtomicUsize::new(0),
        }
    }

    /// Report a full transmit buffer for the next `polls` empty checks.
    pub(crate) fn set_busy_polls(&self, polls: usize) {
        self.busy_polls.store(polls, Ordering::Relaxed);
    }

    pub(crate) fn sent(&self) -> Vec<u8> {
        self.sent.lock().clone()
    }
}

impl UartTx for SimUart {
    fn put_byte(&self, byte: u8) -> bool {
        if self.busy_polls.load(Ordering::Relaxed) > 0 {
            return false;
        }
        self.sent.lock().push(byte);
        true
    }

    fn tx_buffer_is_empty(&self) -> bool {
        let busy = self.busy_polls.load(Ordering::Relaxed);
        if busy > 0 {
            self.busy_polls.store(busy - 1, Ordering::Relaxed);
            return false;
        }
        true
    }
}

/// Worker counting its runs.
pub(crate) struct Counter {
    runs: Cell<usize>,
}

impl Counter {
    pub(crate) fn new() -> Self {
        Self { runs: Cell::new(0) }
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.get()
    }
}

impl<'a, A: Arch> Worker<'a, A> for Counter {
    fn run(&'a self, _task: &'a Task<'a, A>) {
        self.runs.set(self.runs.get() + 1);
    }
}

/// Deterministic LCG for property tests.
pub(crate) struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 16
    }

    pub(crate) fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        min + (self.next_u64() % (max - min))
    }

    pub(crate) fn gen_bool(&mut self) -> bool {
        self.next_u64() & 1 == 0
    }

    pub(crate) fn gen_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_u64() as u8).collect()
    }
}
