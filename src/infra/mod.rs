//! Infrastructure adapters for task storage and completion sinks.

pub mod ledger;
pub mod store;
pub use ledger::InMemoryInventoryLedger;
pub use store::InMemoryStore;
