//! Configuration for workload scoring, assignment, and sinks.

pub mod dispatch;

pub use dispatch::{DispatchConfig, MAX_LOG_CAPACITY};
