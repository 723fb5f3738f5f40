//! Execution module.
//!
//! This module brings pipeline outputs up to date: the metadata passes,
//! staleness decisions, node execution and streaming.

pub mod engine;
pub mod progress;
pub(crate) mod propagation;

pub use engine::{ExecutionOptions, ExecutionStats, UpdateEngine, UpdateReport};
pub use progress::{CancellationToken, ProgressTracker, ProgressUpdate, SkipReason};
