//! Build-time configuration.
//!
//! Values a board would normally pick in its configuration header. The
//! runtime knobs (currently only the SPI polling budget) are validated
//! through [`PollConfig`].

use crate::errors::{ConfigError, ConfigResult};

/// Default number of status-flag checks per SPI poll invocation.
pub const SPI_POLL_MAXLOOPS: u16 = 255;

/// Default debug console ring buffer size. Must be a power of two.
pub const DEBUG_CONSOLE_BUF_SIZE: usize = 64;

/// Number of soft interrupt ids one pending bitmap word can hold.
pub const SOFTIRQ_MAX_IDS: usize = 32;

/// Debug message levels, lowest is most severe.
pub mod level {
    pub const ERROR: u8 = 0;
    pub const WARNING: u8 = 1;
    pub const INFO: u8 = 2;
    pub const VERBOSE: u8 = 3;
}

/// Messages above this level are compiled out.
pub const DEBUG_LEVEL: u8 = level::INFO;

/// Polling budget for polled peripheral drivers.
///
/// A polled driver checks its hardware status flag at most
/// [`max_loops`](Self::max_loops) times per work queue invocation before
/// re-posting itself and yielding the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    max_loops: u16,
}

impl PollConfig {
    /// Polling budget with [`SPI_POLL_MAXLOOPS`] flag checks per invocation.
    pub const fn new() -> Self {
        Self {
            max_loops: SPI_POLL_MAXLOOPS,
        }
    }

    /// Polling budget with `max_loops` flag checks per invocation.
    pub const fn with_max_loops(max_loops: u16) -> ConfigResult<Self> {
        if max_loops == 0 {
            return Err(ConfigError::ZeroPollBudget);
        }
        Ok(Self { max_loops })
    }

    /// Flag checks allowed per invocation.
    pub const fn max_loops(&self) -> u16 {
        self.max_loops
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that a ring buffer size is usable as a mask.
pub const fn check_buffer_size(size: usize) -> ConfigResult<usize> {
    if size.is_power_of_two() {
        Ok(size)
    } else {
        Err(ConfigError::BufferSizeNotPowerOfTwo(size))
    }
}
