//! In-memory inventory ledger.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::inventory::{InventoryAdjustment, InventoryLedger};
use crate::core::DispatchError;
use crate::util::ids::{ItemRef, LocationRef, TenantId};

type StockKey = (TenantId, ItemRef, LocationRef);

/// Journal length of a ledger built with [`InMemoryInventoryLedger::new`].
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

#[derive(Default)]
struct Ledger {
    balances: HashMap<StockKey, i64>,
    journal: VecDeque<InventoryAdjustment>,
}

/// Keeps running balances per tenant, item and location, plus a bounded
/// journal of the most recent adjustments.
pub struct InMemoryInventoryLedger {
    inner: Mutex<Ledger>,
    journal_capacity: usize,
}

impl Default for InMemoryInventoryLedger {
    fn default() -> Self {
        Self::with_journal_capacity(DEFAULT_JOURNAL_CAPACITY)
    }
}

impl InMemoryInventoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger keeping at most `journal_capacity` adjustments;
    /// the oldest is dropped first. Balances are never dropped.
    pub fn with_journal_capacity(journal_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ledger::default()),
            journal_capacity,
        }
    }

    /// Set an opening balance.
    pub fn seed(&self, tenant_id: &TenantId, item: &ItemRef, location: &LocationRef, qty: i64) {
        self.inner
            .lock()
            .balances
            .insert((tenant_id.clone(), item.clone(), location.clone()), qty);
    }

    /// Current balance; zero for unknown stock.
    pub fn balance(&self, tenant_id: &TenantId, item: &ItemRef, location: &LocationRef) -> i64 {
        self.inner
            .lock()
            .balances
            .get(&(tenant_id.clone(), item.clone(), location.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of the retained adjustments, oldest first.
    pub fn adjustments(&self) -> Vec<InventoryAdjustment> {
        self.inner.lock().journal.iter().cloned().collect()
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventoryLedger {
    async fn adjust(&self, adjustment: InventoryAdjustment) -> Result<(), DispatchError> {
        let mut ledger = self.inner.lock();
        let key = (
            adjustment.tenant_id.clone(),
            adjustment.item.clone(),
            adjustment.location.clone(),
        );
        *ledger.balances.entry(key).or_insert(0) += adjustment.delta;
        tracing::debug!(
            item = %adjustment.item,
            location = %adjustment.location,
            delta = adjustment.delta,
            "inventory adjusted"
        );
        if self.journal_capacity == 0 {
            return Ok(());
        }
        if ledger.journal.len() >= self.journal_capacity {
            ledger.journal.pop_front();
        }
        ledger.journal.push_back(adjustment);
        Ok(())
    }
}
