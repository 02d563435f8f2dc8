//! Inventory adjustments emitted by task completion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::DispatchError;
use crate::util::ids::{ItemRef, LocationRef, TaskId, TenantId, WarehouseId};

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// Stock left a bin for an order.
    Pick,
    /// Stock was stored into a bin.
    PutAway,
    /// Approved cycle-count variance.
    CycleCount,
    /// Stock left the inbound dock.
    CrossDockOut,
    /// Stock arrived at the outbound dock.
    CrossDockIn,
}

/// Signed stock change at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Warehouse holding the stock.
    pub warehouse_id: WarehouseId,
    /// Item adjusted.
    pub item: ItemRef,
    /// Location adjusted.
    pub location: LocationRef,
    /// Units added (positive) or removed (negative).
    pub delta: i64,
    /// Reason code.
    pub reason: AdjustmentReason,
    /// Task that caused the adjustment.
    pub task_id: TaskId,
}

/// Inventory adjustment sink (external collaborator).
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Apply one adjustment.
    async fn adjust(&self, adjustment: InventoryAdjustment) -> Result<(), DispatchError>;
}
