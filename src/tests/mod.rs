//! Host test suites run against the simulated interrupt backend.

pub(crate) mod helpers;

mod property;
mod unit;
