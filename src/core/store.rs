//! Data-store capabilities consumed by the dispatch core.
//!
//! One polymorphic [`TaskStore`] covers all five queues; callers narrow by
//! [`TaskKind`] in the filter instead of talking to five repositories. Every
//! filter and write carries an optional `tenant_id` slot that the isolation
//! layer fills in (see [`crate::core::isolation`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::task::{
    Assignment, AssignmentStatus, LoadingDirection, NewTask, Task, TaskDetail, TaskKind,
    TaskStatus, Tenant, Worker, WorkerRole,
};
use crate::core::DispatchError;
use crate::util::ids::{Priority, ShipmentRef, TaskId, TenantId, WarehouseId, WorkerId};

/// Where-clause for task reads and batch writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Tenant scope.
    pub tenant_id: Option<TenantId>,
    /// Single task.
    pub id: Option<TaskId>,
    /// Queue.
    pub kind: Option<TaskKind>,
    /// Warehouse.
    pub warehouse_id: Option<WarehouseId>,
    /// Single assignee.
    pub assignee: Option<WorkerId>,
    /// Any of these statuses.
    pub statuses: Option<Vec<TaskStatus>>,
    /// Completion time in `[start, end)`.
    pub completed_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Planned start strictly before this instant.
    pub scheduled_before: Option<DateTime<Utc>>,
    /// Loading work for this shipment and direction.
    pub shipment: Option<(ShipmentRef, LoadingDirection)>,
}

impl TaskFilter {
    /// Match one task by id.
    pub fn by_id(id: TaskId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Match a queue.
    pub fn of_kind(kind: TaskKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Restrict to a tenant.
    #[must_use]
    pub fn tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Restrict to a warehouse.
    #[must_use]
    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    /// Restrict to a single assignee.
    #[must_use]
    pub fn assignee(mut self, worker_id: WorkerId) -> Self {
        self.assignee = Some(worker_id);
        self
    }

    /// Restrict to any of `statuses`.
    #[must_use]
    pub fn statuses(mut self, statuses: &[TaskStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    /// Restrict to completions in `[start, end)`.
    #[must_use]
    pub fn completed_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.completed_between = Some((start, end));
        self
    }

    /// Restrict to tasks planned to start before `at`.
    #[must_use]
    pub fn scheduled_before(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_before = Some(at);
        self
    }

    /// Restrict to loading work for a shipment.
    #[must_use]
    pub fn shipment(mut self, shipment: ShipmentRef, direction: LoadingDirection) -> Self {
        self.shipment = Some((shipment, direction));
        self
    }

    /// Evaluate the filter against a row.
    pub fn matches(&self, task: &Task) -> bool {
        if self.tenant_id.as_ref().is_some_and(|t| *t != task.tenant_id) {
            return false;
        }
        if self.id.is_some_and(|id| id != task.id) {
            return false;
        }
        if self.kind.is_some_and(|k| k != task.kind()) {
            return false;
        }
        if self.warehouse_id.as_ref().is_some_and(|w| *w != task.warehouse_id) {
            return false;
        }
        if let Some(worker) = &self.assignee {
            if task.assignee.as_ref() != Some(worker) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        if let Some((start, end)) = self.completed_between {
            match task.completed_at {
                Some(at) if at >= start && at < end => {}
                _ => return false,
            }
        }
        if let Some(before) = self.scheduled_before {
            match task.scheduled_start {
                Some(at) if at < before => {}
                _ => return false,
            }
        }
        if let Some((shipment, direction)) = &self.shipment {
            match &task.detail {
                TaskDetail::Loading {
                    shipment: s,
                    direction: d,
                    ..
                } if s == shipment && d == direction => {}
                _ => return false,
            }
        }
        true
    }
}

/// Where-clause for loading assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    /// Tenant scope.
    pub tenant_id: Option<TenantId>,
    /// Loading task.
    pub task_id: Option<TaskId>,
    /// Worker.
    pub worker_id: Option<WorkerId>,
    /// Any of these statuses.
    pub statuses: Option<Vec<AssignmentStatus>>,
    /// Completion time in `[start, end)`.
    pub completed_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl AssignmentFilter {
    /// Assignments of one task.
    pub fn for_task(task_id: TaskId) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    /// Assignments of one worker.
    pub fn for_worker(worker_id: WorkerId) -> Self {
        Self {
            worker_id: Some(worker_id),
            ..Self::default()
        }
    }

    /// Restrict to any of `statuses`.
    #[must_use]
    pub fn statuses(mut self, statuses: &[AssignmentStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    /// Restrict to completions in `[start, end)`.
    #[must_use]
    pub fn completed_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.completed_between = Some((start, end));
        self
    }

    /// Evaluate the filter against a row.
    pub fn matches(&self, row: &Assignment) -> bool {
        if self.tenant_id.as_ref().is_some_and(|t| *t != row.tenant_id) {
            return false;
        }
        if self.task_id.is_some_and(|id| id != row.task_id) {
            return false;
        }
        if self.worker_id.as_ref().is_some_and(|w| *w != row.worker_id) {
            return false;
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&row.status) {
                return false;
            }
        }
        if let Some((start, end)) = self.completed_between {
            match row.completed_at {
                Some(at) if at >= start && at < end => {}
                _ => return false,
            }
        }
        true
    }
}

/// Where-clause for worker directory lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerFilter {
    /// Tenant scope.
    pub tenant_id: Option<TenantId>,
    /// Single worker.
    pub id: Option<WorkerId>,
    /// Warehouse.
    pub warehouse_id: Option<WarehouseId>,
    /// Role.
    pub role: Option<WorkerRole>,
}

impl WorkerFilter {
    /// Evaluate the filter against a row.
    pub fn matches(&self, worker: &Worker) -> bool {
        self.tenant_id.as_ref().is_none_or(|t| *t == worker.tenant_id)
            && self.id.as_ref().is_none_or(|id| *id == worker.id)
            && self.warehouse_id.as_ref().is_none_or(|w| *w == worker.warehouse_id)
            && self.role.is_none_or(|r| r == worker.role)
    }
}

/// Unversioned patch for fields outside the staffing state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New priority.
    pub priority: Option<Priority>,
    /// New planned start.
    pub scheduled_start: Option<DateTime<Utc>>,
}

/// A staffing change applied inside a versioned commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOp {
    /// Staff the task with a worker.
    Assign(WorkerId),
    /// Remove a worker's active assignment.
    Release(WorkerId),
    /// Mark the worker's assignment as started.
    Start(WorkerId),
    /// Mark the worker's assignment as finished.
    Complete(WorkerId),
}

/// Versioned, all-or-nothing write against one task and its assignments.
///
/// The store applies the commit only if the task still carries
/// `expected_version`; otherwise it fails with `VersionConflict` and nothing
/// is written. After the ops run, `workers_assigned` is recomputed from the
/// active staffing and must not exceed `required_workers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCommit {
    /// Tenant scope for the where-clause.
    pub tenant_id: Option<TenantId>,
    /// Task to write.
    pub task_id: TaskId,
    /// Version the caller read.
    pub expected_version: u64,
    /// Staffing changes, applied in order.
    pub ops: Vec<AssignmentOp>,
    /// New task status, if changing.
    pub status: Option<TaskStatus>,
    /// Replacement payload, if changing.
    pub detail: Option<TaskDetail>,
    /// Commit timestamp.
    pub at: DateTime<Utc>,
}

impl TaskCommit {
    /// A commit against the version of `task` the caller read.
    pub fn new(
        task: &Task,
        ops: Vec<AssignmentOp>,
        status: Option<TaskStatus>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: None,
            task_id: task.id,
            expected_version: task.version,
            ops,
            status,
            detail: None,
            at,
        }
    }

    /// Replace the task payload as part of the commit.
    #[must_use]
    pub fn with_detail(mut self, detail: TaskDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Task row after the write.
    pub task: Task,
    /// Assignment rows created or changed by the write.
    pub assignments: Vec<Assignment>,
}

/// Task and assignment persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Count matching tasks.
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, DispatchError>;

    /// Fetch matching tasks.
    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DispatchError>;

    /// Fetch the first matching task.
    async fn find_task(&self, filter: &TaskFilter) -> Result<Option<Task>, DispatchError> {
        Ok(self.find_tasks(filter).await?.into_iter().next())
    }

    /// Insert a task. `task.tenant_id` must be resolved by the caller.
    async fn create_task(&self, task: NewTask) -> Result<Task, DispatchError>;

    /// Insert `task` unless a task matching `existing` is stored, as one
    /// atomic step. Returns the stored row and whether it was created.
    async fn create_task_unless_exists(
        &self,
        existing: &TaskFilter,
        task: NewTask,
    ) -> Result<(Task, bool), DispatchError>;

    /// Patch every matching task; returns the number of rows touched.
    async fn update_tasks(&self, filter: &TaskFilter, patch: &TaskPatch)
        -> Result<u64, DispatchError>;

    /// Delete every matching task and its assignments; returns the number of
    /// tasks removed.
    async fn delete_tasks(&self, filter: &TaskFilter) -> Result<u64, DispatchError>;

    /// Count matching assignments.
    async fn count_assignments(&self, filter: &AssignmentFilter) -> Result<u64, DispatchError>;

    /// Fetch matching assignments.
    async fn find_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, DispatchError>;

    /// Apply a versioned commit atomically.
    async fn commit(&self, commit: TaskCommit) -> Result<CommitReceipt, DispatchError>;
}

/// Worker directory (external collaborator).
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    /// Fetch matching workers.
    async fn find_workers(&self, filter: &WorkerFilter) -> Result<Vec<Worker>, DispatchError>;
}

/// Tenant table; reachable only through the administrative path.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Insert or replace a tenant.
    async fn upsert_tenant(&self, tenant: Tenant) -> Result<(), DispatchError>;

    /// Look a tenant up by id.
    async fn find_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, DispatchError>;
}
