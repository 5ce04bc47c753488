//! Error and status types.
//!
//! Contract violations (an out-of-range soft interrupt id, draining soft
//! interrupts with interrupts enabled, queuing a task without a worker)
//! are bugs and panic. The types here cover what a caller can actually
//! get wrong at runtime: configuration values, and the status of the
//! last polled operation.

use core::fmt;

/// Result type for fallible construction.
pub type Result<T> = core::result::Result<T, Error>;

/// Result type for configuration validation.
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Top-level error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration value
    Config(ConfigError),
    /// Soft interrupt table errors
    SoftIrq(SoftIrqError),
}

/// Configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Polling budget of zero would never make progress
    ZeroPollBudget,
    /// Ring buffer size must be a non-zero power of two
    BufferSizeNotPowerOfTwo(usize),
}

/// Soft interrupt errors reported by the checked API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftIrqError {
    /// Id outside the configured table
    InvalidId(usize),
    /// No handler installed for the id
    NoHandler(usize),
}

/// Status of the last polled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Completed successfully
    #[default]
    Ok,
    /// Still running
    InProgress,
}

impl Status {
    /// Whether the operation has finished.
    pub fn is_done(self) -> bool {
        self != Status::InProgress
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::SoftIrq(e) => write!(f, "Soft interrupt error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPollBudget => write!(f, "Polling budget must be at least one loop"),
            ConfigError::BufferSizeNotPowerOfTwo(size) => {
                write!(f, "Buffer size {} is not a power of two", size)
            }
        }
    }
}

impl fmt::Display for SoftIrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftIrqError::InvalidId(id) => write!(f, "Invalid soft interrupt id: {}", id),
            SoftIrqError::NoHandler(id) => write!(f, "No handler for soft interrupt {}", id),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::InProgress => write!(f, "Operation in progress"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Error::Config(error)
    }
}

impl From<SoftIrqError> for Error {
    fn from(error: SoftIrqError) -> Self {
        Error::SoftIrq(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ConfigError::BufferSizeNotPowerOfTwo(48).to_string(),
            "Buffer size 48 is not a power of two"
        );
        assert_eq!(
            Error::from(SoftIrqError::InvalidId(40)).to_string(),
            "Soft interrupt error: Invalid soft interrupt id: 40"
        );
    }

    #[test]
    fn test_status_done() {
        assert!(Status::Ok.is_done());
        assert!(!Status::InProgress.is_done());
    }
}
