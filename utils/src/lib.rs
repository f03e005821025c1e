//! Shared utilities for chainvote.

pub mod backoff;
pub mod logging;
pub mod tracing_spans;

pub use backoff::{retry, Backoff};
pub use logging::init_tracing;
