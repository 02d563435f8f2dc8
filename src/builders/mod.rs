//! Builders to construct a dispatcher from configuration.

pub mod dispatcher_builder;

pub use dispatcher_builder::{build_dispatcher, build_in_memory, build_in_memory_with, InMemoryDispatch};
