//! Shared utilities for the windex wallet indexer.

pub mod format;
pub mod logging;

pub use format::{format_amount, format_duration};
pub use logging::init_tracing;
