//! Task, assignment, and worker models shared by all five queues.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::ids::{
    AssignmentId, ItemRef, LocationRef, Priority, ShipmentRef, TaskId, TenantId, WarehouseId,
    WorkerId,
};

/// One of the five task queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Order picking.
    Pick,
    /// Put-away of received stock.
    PutAway,
    /// Cycle counting.
    CycleCount,
    /// Cross-dock transfer.
    CrossDock,
    /// Loading or unloading of a shipment.
    Loading,
}

impl TaskKind {
    /// All queues, in aggregation order.
    pub const ALL: [Self; 5] = [
        Self::Pick,
        Self::PutAway,
        Self::CycleCount,
        Self::CrossDock,
        Self::Loading,
    ];

    /// Statuses that count toward a worker's load for this queue.
    ///
    /// For `Loading` the load is carried by assignments, see [`AssignmentStatus::ACTIVE`].
    pub const fn active_statuses(self) -> &'static [TaskStatus] {
        match self {
            Self::Pick => &[TaskStatus::Pending, TaskStatus::Assigned, TaskStatus::InProgress],
            Self::PutAway | Self::CycleCount | Self::CrossDock | Self::Loading => {
                &[TaskStatus::Assigned, TaskStatus::InProgress]
            }
        }
    }

    /// Statuses that mean the worker finished their part of the task.
    pub const fn done_statuses(self) -> &'static [TaskStatus] {
        match self {
            Self::CycleCount => &[
                TaskStatus::Completed,
                TaskStatus::VarianceReview,
                TaskStatus::Approved,
                TaskStatus::Rejected,
            ],
            _ => &[TaskStatus::Completed],
        }
    }

    /// Whether the queue staffs tasks through assignment rows instead of a single assignee.
    pub const fn is_multi_assignee(self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pick => "pick",
            Self::PutAway => "put_away",
            Self::CycleCount => "cycle_count",
            Self::CrossDock => "cross_dock",
            Self::Loading => "loading",
        };
        f.write_str(s)
    }
}

/// Shared status vocabulary; not every status applies to every queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Awaiting assignment.
    Pending,
    /// Fully staffed, not yet started.
    Assigned,
    /// Work under way.
    InProgress,
    /// Work suspended by the worker.
    Paused,
    /// Work finished.
    Completed,
    /// Abandoned before completion.
    Cancelled,
    /// Cycle count finished with a quantity mismatch.
    VarianceReview,
    /// Cycle-count variance accepted; inventory adjusted.
    Approved,
    /// Cycle-count variance rejected.
    Rejected,
}

impl TaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 9] = [
        Self::Pending,
        Self::Assigned,
        Self::InProgress,
        Self::Paused,
        Self::Completed,
        Self::Cancelled,
        Self::VarianceReview,
        Self::Approved,
        Self::Rejected,
    ];

    /// Terminal statuses accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Approved | Self::Rejected
        )
    }

    /// Whether the status belongs to the vocabulary of `kind`.
    pub const fn applies_to(self, kind: TaskKind) -> bool {
        match self {
            Self::VarianceReview | Self::Approved | Self::Rejected => {
                matches!(kind, TaskKind::CycleCount)
            }
            _ => true,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::VarianceReview => "VARIANCE_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Status of a loading assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    /// Worker assigned, not started.
    Assigned,
    /// Worker is on the dock.
    InProgress,
    /// Worker finished their share.
    Completed,
}

impl AssignmentStatus {
    /// Assignment statuses that count toward load and staffing.
    pub const ACTIVE: [Self; 2] = [Self::Assigned, Self::InProgress];

    /// Whether the assignment still occupies the worker.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

/// Loading dock direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingDirection {
    /// Outbound: stock goes onto the trailer.
    Loading,
    /// Inbound: stock comes off the trailer.
    Unloading,
}

/// Queue-specific payload. Opaque to workload balancing; read by completion effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskDetail {
    /// Pick `quantity` of `item` from `location`.
    Pick {
        /// Item to pick.
        item: ItemRef,
        /// Source bin.
        location: LocationRef,
        /// Units to pick.
        quantity: u32,
    },
    /// Put `quantity` of `item` away into `to_location`.
    PutAway {
        /// Item to store.
        item: ItemRef,
        /// Destination bin.
        to_location: LocationRef,
        /// Units to store.
        quantity: u32,
    },
    /// Count `item` at `location`.
    CycleCount {
        /// Item to count.
        item: ItemRef,
        /// Bin being counted.
        location: LocationRef,
        /// System quantity at count time.
        expected_qty: i64,
        /// Quantity the worker counted, once recorded.
        counted_qty: Option<i64>,
    },
    /// Move `quantity` of `item` from the inbound dock to the outbound dock.
    CrossDock {
        /// Item being transferred.
        item: ItemRef,
        /// Receiving dock.
        inbound_dock: LocationRef,
        /// Shipping dock.
        outbound_dock: LocationRef,
        /// Units transferred.
        quantity: u32,
    },
    /// Load or unload a shipment.
    Loading {
        /// Shipment being worked.
        shipment: ShipmentRef,
        /// Dock direction.
        direction: LoadingDirection,
        /// Planned duration in minutes.
        estimated_minutes: u32,
    },
}

impl TaskDetail {
    /// Queue this payload belongs to.
    pub const fn kind(&self) -> TaskKind {
        match self {
            Self::Pick { .. } => TaskKind::Pick,
            Self::PutAway { .. } => TaskKind::PutAway,
            Self::CycleCount { .. } => TaskKind::CycleCount,
            Self::CrossDock { .. } => TaskKind::CrossDock,
            Self::Loading { .. } => TaskKind::Loading,
        }
    }
}

/// A unit of warehouse work in any of the five queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Owning tenant; never changes after creation.
    pub tenant_id: TenantId,
    /// Warehouse the work happens in.
    pub warehouse_id: WarehouseId,
    /// Current status.
    pub status: TaskStatus,
    /// Scheduling priority.
    pub priority: Priority,
    /// Single assignee (all queues except `Loading`).
    pub assignee: Option<WorkerId>,
    /// Workers the task needs; always 1 outside `Loading`.
    pub required_workers: u32,
    /// Workers currently staffed.
    pub workers_assigned: u32,
    /// Optimistic-concurrency version, bumped on every commit.
    pub version: u64,
    /// Queue-specific payload.
    pub detail: TaskDetail,
    /// Planned start, if scheduled.
    pub scheduled_start: Option<DateTime<Utc>>,
    /// First transition to `IN_PROGRESS`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the worker finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Queue this task belongs to.
    pub const fn kind(&self) -> TaskKind {
        self.detail.kind()
    }

    /// Workers still missing before the task is fully staffed.
    pub const fn workers_needed(&self) -> u32 {
        self.required_workers.saturating_sub(self.workers_assigned)
    }

    /// Whether active staffing meets the requirement.
    pub const fn is_fully_staffed(&self) -> bool {
        self.workers_assigned >= self.required_workers
    }
}

/// Data for a task about to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    /// Tenant; overwritten by the isolation layer on scoped creates.
    pub tenant_id: Option<TenantId>,
    /// Warehouse the work happens in.
    pub warehouse_id: WarehouseId,
    /// Scheduling priority.
    pub priority: Priority,
    /// Workers needed; ignored (forced to 1) outside `Loading`.
    pub required_workers: u32,
    /// Queue-specific payload.
    pub detail: TaskDetail,
    /// Planned start.
    pub scheduled_start: Option<DateTime<Utc>>,
}

impl NewTask {
    /// A single-worker task with default priority.
    pub fn new(warehouse_id: impl Into<WarehouseId>, detail: TaskDetail) -> Self {
        Self {
            tenant_id: None,
            warehouse_id: warehouse_id.into(),
            priority: Priority::default(),
            required_workers: 1,
            detail,
            scheduled_start: None,
        }
    }

    /// Set the worker requirement (only meaningful for `Loading`).
    #[must_use]
    pub fn with_required_workers(mut self, required: u32) -> Self {
        self.required_workers = required;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the planned start.
    #[must_use]
    pub fn with_scheduled_start(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(at);
        self
    }

    /// Materialize the row. Callers must have resolved the tenant already.
    pub fn into_task(self, tenant_id: TenantId, now: DateTime<Utc>) -> Task {
        let required_workers = if self.detail.kind().is_multi_assignee() {
            self.required_workers.max(1)
        } else {
            1
        };
        Task {
            id: TaskId::generate(),
            tenant_id,
            warehouse_id: self.warehouse_id,
            status: TaskStatus::Pending,
            priority: self.priority,
            assignee: None,
            required_workers,
            workers_assigned: 0,
            version: 0,
            detail: self.detail,
            scheduled_start: self.scheduled_start,
            started_at: None,
            completed_at: None,
            created_at: now,
        }
    }
}

/// A worker's share of a loading task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Assignment identifier.
    pub id: AssignmentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Loading task.
    pub task_id: TaskId,
    /// Assigned worker.
    pub worker_id: WorkerId,
    /// Current status.
    pub status: AssignmentStatus,
    /// When the assignment was created.
    pub assigned_at: DateTime<Utc>,
    /// When the worker started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the worker finished.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Worker roles known to the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Floor worker eligible for task assignment.
    WarehouseWorker,
    /// Shift supervisor.
    Supervisor,
    /// Tenant administrator.
    Admin,
}

/// A worker as seen by the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Worker identifier.
    pub id: WorkerId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Home warehouse.
    pub warehouse_id: WarehouseId,
    /// Role.
    pub role: WorkerRole,
}

/// Tenant row, managed only through the administrative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant identifier.
    pub id: TenantId,
    /// Display name.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick() -> TaskDetail {
        TaskDetail::Pick {
            item: "sku-1".into(),
            location: "A-01".into(),
            quantity: 3,
        }
    }

    #[test]
    fn test_single_assignee_requirement_is_forced_to_one() {
        let task = NewTask::new("wh-1", pick())
            .with_required_workers(4)
            .into_task("t1".into(), Utc::now());
        assert_eq!(task.required_workers, 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.kind(), TaskKind::Pick);
    }

    #[test]
    fn test_loading_requirement_is_at_least_one() {
        let detail = TaskDetail::Loading {
            shipment: "shp-1".into(),
            direction: LoadingDirection::Loading,
            estimated_minutes: 30,
        };
        let task = NewTask::new("wh-1", detail)
            .with_required_workers(0)
            .into_task("t1".into(), Utc::now());
        assert_eq!(task.required_workers, 1);
        assert_eq!(task.workers_needed(), 1);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Approved.is_terminal());
        assert!(!TaskStatus::VarianceReview.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn test_variance_statuses_only_apply_to_cycle_count() {
        assert!(TaskStatus::VarianceReview.applies_to(TaskKind::CycleCount));
        assert!(!TaskStatus::VarianceReview.applies_to(TaskKind::Pick));
        assert!(TaskStatus::Paused.applies_to(TaskKind::Loading));
    }

    #[test]
    fn test_detail_serializes_with_kind_tag() {
        let json = serde_json::to_value(pick()).unwrap();
        assert_eq!(json["kind"], "pick");
        assert_eq!(json["quantity"], 3);
    }
}
