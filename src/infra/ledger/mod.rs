//! Inventory ledger backends.

pub mod memory;

pub use memory::InMemoryInventoryLedger;
