//! Property-based tests over randomized operation sequences.

#[cfg(test)]
mod property_tests {
    use crate::arch::host::SimArch;
    use crate::arch::Arch;
    use crate::config::PollConfig;
    use crate::drivers::spi::SpiMaster;
    use crate::errors::Status;
    use crate::sched::{NestedWorkQueue, Task, WorkQueue};
    use crate::softirq::SoftIrq;
    use crate::tests::helpers::{drain, Counter, SimSpi, SimpleRng};
    use core::cell::{Cell, RefCell};
    use core::ptr;
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    fn index_of<'a>(tasks: &[Task<'a, SimArch>], task: &Task<'a, SimArch>) -> usize {
        tasks
            .iter()
            .position(|t| ptr::eq(t, task))
            .expect("task not from this pool")
    }

    #[test]
    fn property_workqueue_matches_fifo_model() {
        let mut rng = SimpleRng::new(0x12345678);
        let counter = Counter::new();
        let queue = WorkQueue::<SimArch>::new();
        let tasks: Vec<Task<SimArch>> = (0..8).map(|_| Task::with_worker(&counter)).collect();
        let mut model: VecDeque<usize> = VecDeque::new();

        for _ in 0..2000 {
            if rng.gen_bool() {
                let i = rng.gen_range(0, 8) as usize;
                let queued = queue.add_task(&tasks[i]);
                // Property: add succeeds exactly when the task was not queued
                assert_eq!(queued, !model.contains(&i));
                if queued {
                    model.push_back(i);
                }
            } else {
                let popped = queue.pop_task().map(|t| index_of(&tasks, t));
                assert_eq!(popped, model.pop_front());
            }
            assert_eq!(queue.len(), model.len());
            for (i, task) in tasks.iter().enumerate() {
                assert_eq!(task.is_queued(), model.contains(&i));
            }
        }
    }

    #[test]
    fn property_nested_queue_single_owner() {
        let mut rng = SimpleRng::new(0xdeadbeef);
        let counter = Counter::new();
        let main = WorkQueue::<SimArch>::new();
        let nwq = NestedWorkQueue::new(&main);
        let tasks: Vec<Task<SimArch>> = (0..6).map(|_| Task::with_worker(&counter)).collect();
        let mut owner: Option<usize> = None;
        let mut waiting: VecDeque<usize> = VecDeque::new();

        for _ in 0..2000 {
            match rng.gen_range(0, 3) {
                0 => {
                    let i = rng.gen_range(0, 6) as usize;
                    if owner == Some(i) || waiting.contains(&i) {
                        continue;
                    }
                    assert!(nwq.add_task(&tasks[i]));
                    if owner.is_none() {
                        owner = Some(i);
                    } else {
                        waiting.push_back(i);
                    }
                }
                1 if owner.is_some() => {
                    // The owner finished its current step.
                    main.pop_task();
                    nwq.next_task();
                    owner = waiting.pop_front();
                }
                _ => {}
            }

            // Property: only the owner is ever in the main queue
            assert!(main.len() <= 1);
            if let Some(task) = main.pop_task() {
                assert_eq!(Some(index_of(&tasks, task)), owner);
                main.add_task(task);
            }
            assert_eq!(nwq.current().map(|t| index_of(&tasks, t)), owner);
            assert_eq!(nwq.waiting(), waiting.len());
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Transfer {
        Write,
        Read,
        Exchange,
        WriteList,
        ReadList,
        ExchangeList,
    }

    const TRANSFERS: [Transfer; 6] = [
        Transfer::Write,
        Transfer::Read,
        Transfer::Exchange,
        Transfer::WriteList,
        Transfer::ReadList,
        Transfer::ExchangeList,
    ];

    /// Split `len` into one to four non-empty piece lengths.
    fn split_lengths(rng: &mut SimpleRng, len: usize) -> Vec<usize> {
        let mut pieces = Vec::new();
        let mut left = len;
        while left > 0 {
            let take = if pieces.len() == 3 {
                left
            } else {
                rng.gen_range(1, left as u64 + 1) as usize
            };
            pieces.push(take);
            left -= take;
        }
        pieces
    }

    fn split<'s, T>(mut data: &'s [T], lengths: &[usize]) -> Vec<&'s [T]> {
        lengths
            .iter()
            .map(|&n| {
                let (head, rest) = data.split_at(n);
                data = rest;
                head
            })
            .collect()
    }

    #[test]
    fn property_spi_transfers_every_byte_once() {
        let mut rng = SimpleRng::new(0xabcdef01);

        for round in 0..300 {
            SimArch::reset();
            let transfer = TRANSFERS[round % TRANSFERS.len()];
            let len = rng.gen_range(1, 40) as usize;
            let max_loops = rng.gen_range(1, 8) as u16;
            let ready_every = rng.gen_range(1, 6) as usize;
            let tx = rng.gen_bytes(len);
            let responses = rng.gen_bytes(len);
            let rx: Vec<Cell<u8>> = (0..len).map(|_| Cell::new(0)).collect();
            let lengths = split_lengths(&mut rng, len);
            let tx_list = split(&tx, &lengths);
            let rx_list = split(&rx, &lengths);

            let queue = WorkQueue::<SimArch>::new();
            let hw = SimSpi::new();
            hw.ready_every(ready_every);
            hw.respond(&responses);
            let config = PollConfig::with_max_loops(max_loops).unwrap();
            let spi = SpiMaster::new(hw, &queue, config);

            let buffers = match transfer {
                Transfer::Write => {
                    spi.write(&tx);
                    1
                }
                Transfer::Read => {
                    spi.read(&rx);
                    1
                }
                Transfer::Exchange => {
                    spi.exchange(&tx, &rx);
                    1
                }
                Transfer::WriteList => {
                    spi.write_buf_list(&tx_list);
                    lengths.len()
                }
                Transfer::ReadList => {
                    spi.read_buf_list(&rx_list);
                    lengths.len()
                }
                Transfer::ExchangeList => {
                    spi.exchange_buf_list(&tx_list, &rx_list);
                    lengths.len()
                }
            };
            let is_list = matches!(
                transfer,
                Transfer::WriteList | Transfer::ReadList | Transfer::ExchangeList
            );
            let writes = !matches!(transfer, Transfer::Read | Transfer::ReadList);
            let reads = !matches!(transfer, Transfer::Write | Transfer::WriteList);
            let runs = drain(&queue) as u32;

            // Property: N bytes out, N bytes in, residue zero
            let expected_tx = if writes { tx.clone() } else { vec![0; len] };
            assert_eq!(spi.hw().sent(), expected_tx, "{:?}", transfer);
            let received: Vec<u8> = rx.iter().map(Cell::get).collect();
            let expected_rx = if reads { responses.clone() } else { vec![0; len] };
            assert_eq!(received, expected_rx, "{:?}", transfer);
            assert_eq!(spi.residue(), 0);
            assert_eq!(spi.status(), Status::Ok);

            // Property: each buffer ends with one poll that does not yield,
            // and a buffer list adds one next-buffer run per buffer
            let next_buffer_runs = if is_list { buffers as u32 } else { 0 };
            assert_eq!(spi.stats().polls() + next_buffer_runs, runs, "{:?}", transfer);
            assert_eq!(
                spi.stats().yields() + buffers as u32,
                spi.stats().polls(),
                "{:?}",
                transfer
            );
            assert_eq!(spi.hw().checks(), len * ready_every);
        }
    }

    #[test]
    fn property_softirqs_drain_in_id_order() {
        let mut rng = SimpleRng::new(0x5eed);

        for _ in 0..50 {
            SimArch::reset();
            let log = RefCell::new(Vec::new());
            let handlers: Vec<_> = (0..16usize)
                .map(|id| {
                    let log = &log;
                    move || log.borrow_mut().push(id)
                })
                .collect();
            let sirq = SoftIrq::<SimArch, 16>::new();
            for (id, handler) in handlers.iter().enumerate() {
                sirq.set_handler(id, handler);
            }

            let mut raised = Vec::new();
            for _ in 0..rng.gen_range(1, 24) {
                let id = rng.gen_range(0, 16) as usize;
                sirq.raise(id);
                if !raised.contains(&id) {
                    raised.push(id);
                }
            }
            raised.sort_unstable();

            SimArch::disable_interrupts();
            let handled = sirq.poll();
            SimArch::enable_interrupts();

            // Property: each raised id runs once, lowest first
            assert_eq!(handled, raised.len());
            assert_eq!(*log.borrow(), raised);
        }
    }
}
