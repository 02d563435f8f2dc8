//! Movement audit sinks.
//!
//! Every task completion appends one immutable [`MovementRecord`]. Provides an
//! in-memory bounded sink and Postgres schema definitions for persistence.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::{Task, TaskDetail, TaskKind, TaskStatus};
use crate::util::clock::now;
use crate::util::ids::{ItemRef, LocationRef, MovementId, ShipmentRef, TaskId, TenantId};

/// What kind of movement happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementAction {
    /// Picked out of a bin.
    Pick,
    /// Stored into a bin.
    PutAway,
    /// Counted with no variance.
    Count,
    /// Count variance approved and applied.
    CountAdjusted,
    /// Count variance rejected; stock untouched.
    CountRejected,
    /// Moved across docks.
    CrossDock,
    /// Shipment loaded.
    Load,
    /// Shipment unloaded.
    Unload,
}

/// Immutable audit row for a completed movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    /// Record identifier.
    pub record_id: MovementId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Task that completed.
    pub task_id: TaskId,
    /// Queue of that task.
    pub kind: TaskKind,
    /// Movement performed.
    pub action: MovementAction,
    /// Item moved or counted.
    pub item: Option<ItemRef>,
    /// Source location.
    pub from_location: Option<LocationRef>,
    /// Destination location.
    pub to_location: Option<LocationRef>,
    /// Units moved (signed for count adjustments).
    pub quantity: i64,
    /// Shipment for loading work.
    pub shipment: Option<ShipmentRef>,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
    /// Free-form context.
    pub note: Option<String>,
}

/// Movement sink abstraction.
pub trait MovementSink: Send {
    /// Record a movement.
    fn record(&mut self, record: MovementRecord);
}

/// Sink shared between the lifecycle and whoever reads it back.
pub type SharedMovementSink = Arc<Mutex<dyn MovementSink>>;

/// In-memory movement sink for testing and dev.
pub struct InMemoryMovementSink {
    records: VecDeque<MovementRecord>,
    max_records: usize,
}

impl InMemoryMovementSink {
    /// Create a new in-memory sink with a bounded buffer. Storage grows on
    /// demand up to `max_records`.
    pub fn new(max_records: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_records,
        }
    }

    /// Retrieve a snapshot of stored records.
    pub fn records(&self) -> Vec<MovementRecord> {
        self.records.iter().cloned().collect()
    }
}

impl MovementSink for InMemoryMovementSink {
    fn record(&mut self, record: MovementRecord) {
        if self.max_records == 0 {
            return;
        }
        if self.records.len() >= self.max_records {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

/// Postgres-backed movement sink (schema-only; DB I/O not wired).
pub struct PostgresMovementSink;

impl PostgresMovementSink {
    /// Returns SQL migration statements for the movement log.
    pub fn migrations() -> &'static [&'static str] {
        &[r"
CREATE TABLE IF NOT EXISTS wd_movements (
    record_id UUID PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    task_id UUID NOT NULL,
    kind TEXT NOT NULL,
    action TEXT NOT NULL,
    item TEXT,
    from_location TEXT,
    to_location TEXT,
    quantity BIGINT NOT NULL,
    shipment TEXT,
    note TEXT,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_wd_movements_task_action ON wd_movements (task_id, action);
CREATE INDEX IF NOT EXISTS idx_wd_movements_tenant_recorded ON wd_movements (tenant_id, recorded_at);
"]
    }
}

impl MovementSink for PostgresMovementSink {
    fn record(&mut self, _record: MovementRecord) {
        // Stub: DB writes need a client; left to the integration layer.
    }
}

/// Build the movement record for a task that just reached `status`.
pub fn build_movement_record(task: &Task, status: TaskStatus, note: Option<String>) -> MovementRecord {
    let mut record = MovementRecord {
        record_id: MovementId::generate(),
        tenant_id: task.tenant_id.clone(),
        task_id: task.id,
        kind: task.kind(),
        action: MovementAction::Pick,
        item: None,
        from_location: None,
        to_location: None,
        quantity: 0,
        shipment: None,
        recorded_at: now(),
        note,
    };
    match &task.detail {
        TaskDetail::Pick {
            item,
            location,
            quantity,
        } => {
            record.item = Some(item.clone());
            record.from_location = Some(location.clone());
            record.quantity = i64::from(*quantity);
        }
        TaskDetail::PutAway {
            item,
            to_location,
            quantity,
        } => {
            record.action = MovementAction::PutAway;
            record.item = Some(item.clone());
            record.to_location = Some(to_location.clone());
            record.quantity = i64::from(*quantity);
        }
        TaskDetail::CycleCount {
            item,
            location,
            expected_qty,
            counted_qty,
        } => {
            record.action = match status {
                TaskStatus::Approved => MovementAction::CountAdjusted,
                TaskStatus::Rejected => MovementAction::CountRejected,
                _ => MovementAction::Count,
            };
            record.item = Some(item.clone());
            record.from_location = Some(location.clone());
            record.quantity = counted_qty.map_or(0, |counted| counted - expected_qty);
        }
        TaskDetail::CrossDock {
            item,
            inbound_dock,
            outbound_dock,
            quantity,
        } => {
            record.action = MovementAction::CrossDock;
            record.item = Some(item.clone());
            record.from_location = Some(inbound_dock.clone());
            record.to_location = Some(outbound_dock.clone());
            record.quantity = i64::from(*quantity);
        }
        TaskDetail::Loading {
            shipment,
            direction,
            ..
        } => {
            record.action = match direction {
                crate::core::task::LoadingDirection::Loading => MovementAction::Load,
                crate::core::task::LoadingDirection::Unloading => MovementAction::Unload,
            };
            record.shipment = Some(shipment.clone());
        }
    }
    record
}
