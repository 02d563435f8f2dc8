//! Build a dispatcher from configuration and backends.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::DispatchConfig;
use crate::core::{
    DispatchError, Dispatcher, InMemoryMovementSink, InventoryLedger, SharedMovementSink,
    TaskStore, TenantRegistry, WorkerDirectory,
};
use crate::infra::{InMemoryInventoryLedger, InMemoryStore};

/// Validate `cfg` and wire a dispatcher over the given backends.
pub fn build_dispatcher<B>(
    cfg: DispatchConfig,
    backend: Arc<B>,
    ledger: Arc<dyn InventoryLedger>,
    movements: SharedMovementSink,
) -> Result<Dispatcher<B>, DispatchError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    cfg.validate()
        .map_err(|e| DispatchError::InvalidConfig(format!("config invalid: {e}")))?;
    tracing::debug!(
        overload_cap = cfg.overload_cap,
        commit_retries = cfg.max_commit_retries,
        "dispatcher configured"
    );
    Ok(Dispatcher::new(backend, ledger, movements, cfg))
}

/// A dispatcher over in-memory backends, with handles to inspect them.
pub struct InMemoryDispatch {
    /// The dispatcher.
    pub dispatcher: Dispatcher<InMemoryStore>,
    /// Raw store, for seeding workers.
    pub store: Arc<InMemoryStore>,
    /// Inventory ledger receiving completion adjustments.
    pub ledger: Arc<InMemoryInventoryLedger>,
    /// Movement log.
    pub movements: Arc<Mutex<InMemoryMovementSink>>,
}

/// Build a fully in-memory dispatcher for development and tests.
pub fn build_in_memory(cfg: DispatchConfig) -> Result<InMemoryDispatch, DispatchError> {
    build_in_memory_with(cfg, InMemoryStore::new())
}

/// Like [`build_in_memory`] but over a caller-configured store.
pub fn build_in_memory_with(
    cfg: DispatchConfig,
    store: InMemoryStore,
) -> Result<InMemoryDispatch, DispatchError> {
    let store = Arc::new(store);
    let ledger = Arc::new(InMemoryInventoryLedger::with_journal_capacity(
        cfg.movement_log_capacity,
    ));
    let movements = Arc::new(Mutex::new(InMemoryMovementSink::new(cfg.movement_log_capacity)));
    let dispatcher = build_dispatcher(
        cfg,
        Arc::clone(&store),
        Arc::clone(&ledger) as Arc<dyn InventoryLedger>,
        Arc::clone(&movements) as SharedMovementSink,
    )?;
    Ok(InMemoryDispatch {
        dispatcher,
        store,
        ledger,
        movements,
    })
}
