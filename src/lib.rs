//! Stopwatch for named activities. Every finished run is appended to a persisted log, and the
//! log is folded into per-activity and per-day totals, optionally billed at an hourly rate.
//!

pub mod aggregate;
pub mod cli;
pub mod error;
pub mod store;
pub mod timer;
pub mod utils;
