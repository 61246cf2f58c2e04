//! Utility functions and helpers
//!
//! Atomic file writes for the record store and logging setup for the binary.

pub mod atomic;
pub mod logging;

pub use atomic::{atomic_write, remove_stale_temp, AtomicError, AtomicResult};
pub use logging::init_logging;
