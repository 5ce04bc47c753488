//! Unit tests for the scheduling core.

#[cfg(test)]
mod task_tests {
    use crate::arch::host::SimArch;
    use crate::sched::{run_task, Task, WorkQueue};
    use crate::tests::helpers::{drain, Counter};

    #[test]
    fn test_run_task_invokes_worker() {
        let counter = Counter::new();
        let task: Task<SimArch> = Task::with_worker(&counter);

        run_task(&task);
        run_task(&task);
        assert_eq!(counter.runs(), 2);
    }

    #[test]
    fn test_set_worker_while_queued() {
        let first = Counter::new();
        let second = Counter::new();
        let queue = WorkQueue::<SimArch>::new();
        let task: Task<SimArch> = Task::with_worker(&first);

        queue.add_task(&task);
        task.set_worker(&second);
        drain(&queue);

        assert_eq!(first.runs(), 0);
        assert_eq!(second.runs(), 1);
    }

    #[test]
    fn test_late_bound_worker() {
        let counter = Counter::new();
        let task: Task<SimArch> = Task::new();
        assert!(!task.has_worker());

        task.set_worker(&counter);
        task.run();
        assert_eq!(counter.runs(), 1);
    }

    #[test]
    #[should_panic(expected = "no worker")]
    fn test_run_without_worker_panics() {
        let task: Task<SimArch> = Task::new();
        task.run();
    }
}

#[cfg(test)]
mod workqueue_tests {
    use crate::arch::host::SimArch;
    use crate::arch::Arch;
    use crate::sched::{Task, WorkQueue, Worker};
    use crate::tests::helpers::drain;
    use core::cell::Cell;

    /// Re-queues itself until it has run `limit` times.
    struct Repeat<'a> {
        queue: &'a WorkQueue<'a, SimArch>,
        runs: Cell<usize>,
        limit: usize,
    }

    impl<'a> Worker<'a, SimArch> for Repeat<'a> {
        fn run(&'a self, task: &'a Task<'a, SimArch>) {
            assert!(!task.is_queued());
            self.runs.set(self.runs.get() + 1);
            if self.runs.get() < self.limit {
                assert!(self.queue.add_task(task));
            }
        }
    }

    #[test]
    fn test_worker_requeues_itself() {
        let queue = WorkQueue::<SimArch>::new();
        let repeat = Repeat {
            queue: &queue,
            runs: Cell::new(0),
            limit: 5,
        };
        let task = Task::with_worker(&repeat);

        queue.add_task(&task);
        assert_eq!(drain(&queue), 5);
        assert_eq!(repeat.runs.get(), 5);
    }

    #[test]
    fn test_operations_leave_interrupts_disabled_when_called_disabled() {
        SimArch::reset();
        let queue = WorkQueue::<SimArch>::new();
        let repeat = Repeat {
            queue: &queue,
            runs: Cell::new(0),
            limit: 1,
        };
        let task = Task::with_worker(&repeat);

        SimArch::disable_interrupts();
        queue.add_task(&task);
        assert!(!SimArch::interrupts_enabled());
        queue.pop_task();
        assert!(!SimArch::interrupts_enabled());
        SimArch::enable_interrupts();
    }

    #[test]
    fn test_len_tracks_links() {
        let queue = WorkQueue::<SimArch>::new();
        let repeat = Repeat {
            queue: &queue,
            runs: Cell::new(0),
            limit: 1,
        };
        let a = Task::with_worker(&repeat);
        let b = Task::with_worker(&repeat);
        let c = Task::with_worker(&repeat);

        queue.add_task(&a);
        queue.add_task(&b);
        queue.add_task(&c);
        assert_eq!(queue.len(), 3);

        queue.pop_task();
        assert_eq!(queue.len(), 2);
        queue.add_task(&a);
        assert_eq!(queue.len(), 3);
    }
}

#[cfg(test)]
mod error_tests {
    use crate::config::{check_buffer_size, PollConfig};
    use crate::errors::{ConfigError, Error};

    fn budget(loops: u16) -> crate::errors::Result<PollConfig> {
        Ok(PollConfig::with_max_loops(loops)?)
    }

    #[test]
    fn test_config_error_converts() {
        assert_eq!(budget(0), Err(Error::Config(ConfigError::ZeroPollBudget)));
        assert!(budget(1).is_ok());
    }

    #[test]
    fn test_buffer_size_check_is_const() {
        const SIZE: Result<usize, ConfigError> = check_buffer_size(128);
        assert_eq!(SIZE, Ok(128));
    }
}
