//! Task lifecycle: legality table, worker operations and completion effects.
//!
//! Legal edges (shared by all queues unless noted):
//!
//! ```text
//! PENDING     -> ASSIGNED      needs at least one active assignment
//! ASSIGNED    -> IN_PROGRESS
//! ASSIGNED    -> PENDING       assignment engine only (unassign)
//! IN_PROGRESS -> COMPLETED     not for a cycle count with a variance
//! IN_PROGRESS -> PAUSED
//! PAUSED      -> ASSIGNED | IN_PROGRESS
//! *           -> CANCELLED     from any non-terminal status
//! cycle count: IN_PROGRESS -> VARIANCE_REVIEW -> APPROVED | REJECTED
//! ```
//!
//! Completion effects run only for the caller whose status commit won the
//! version race, so a retried or concurrent completion applies them once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::core::assignment::{active_workers, load_task, retry_on_conflict};
use crate::core::audit::{build_movement_record, SharedMovementSink};
use crate::core::inventory::{AdjustmentReason, InventoryAdjustment, InventoryLedger};
use crate::core::store::{AssignmentFilter, AssignmentOp, TaskCommit, TaskStore};
use crate::core::task::{AssignmentStatus, Task, TaskDetail, TaskKind, TaskStatus};
use crate::core::DispatchError;
use crate::util::clock::now;
use crate::util::ids::{ItemRef, LocationRef, TaskId, WorkerId};

/// Whether `from -> to` is an edge of the lifecycle graph for `kind`.
///
/// Data-dependent guards (active assignments, count variance) are checked by
/// [`TaskLifecycle::transition`] on top of this.
pub fn is_legal_transition(kind: TaskKind, from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::{
        Approved, Assigned, Cancelled, Completed, InProgress, Paused, Pending, Rejected,
        VarianceReview,
    };
    if from.is_terminal() || !from.applies_to(kind) || !to.applies_to(kind) {
        return false;
    }
    matches!(
        (from, to),
        (_, Cancelled)
            | (Pending | Paused, Assigned)
            | (Assigned, Pending)
            | (Assigned | Paused, InProgress)
            | (InProgress, Completed | Paused | VarianceReview)
            | (VarianceReview, Approved | Rejected)
    )
}

/// Result of a status change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "task", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The status changed; any completion effects ran.
    Applied(Task),
    /// The task was already in the requested terminal status; nothing ran.
    AlreadyApplied(Task),
}

impl TransitionOutcome {
    /// Task row after the call.
    pub const fn task(&self) -> &Task {
        match self {
            Self::Applied(task) | Self::AlreadyApplied(task) => task,
        }
    }

    /// Whether this call changed the status.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

fn invalid(task: &Task, to: TaskStatus) -> DispatchError {
    DispatchError::InvalidTransition {
        kind: task.kind(),
        from: task.status,
        to,
    }
}

/// `counted - expected` for a cycle count, if a count was recorded.
fn count_variance(task: &Task) -> Option<i64> {
    match &task.detail {
        TaskDetail::CycleCount {
            expected_qty,
            counted_qty: Some(counted),
            ..
        } => Some(counted - expected_qty),
        _ => None,
    }
}

/// Drives status changes and their side effects.
pub struct TaskLifecycle<S> {
    store: S,
    ledger: Arc<dyn InventoryLedger>,
    movements: SharedMovementSink,
    config: Arc<DispatchConfig>,
}

impl<S: Clone> Clone for TaskLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: Arc::clone(&self.ledger),
            movements: Arc::clone(&self.movements),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: TaskStore> TaskLifecycle<S> {
    /// Create a lifecycle over `store` writing effects to `ledger` and `movements`.
    pub fn new(
        store: S,
        ledger: Arc<dyn InventoryLedger>,
        movements: SharedMovementSink,
        config: Arc<DispatchConfig>,
    ) -> Self {
        Self {
            store,
            ledger,
            movements,
            config,
        }
    }

    /// Move a task to `to`, enforcing the legality table.
    ///
    /// Repeating a terminal status the task already has returns
    /// [`TransitionOutcome::AlreadyApplied`] without side effects. Direct
    /// moves back to `PENDING` are rejected; use the assignment engine.
    pub async fn transition(
        &self,
        task_id: TaskId,
        to: TaskStatus,
    ) -> Result<TransitionOutcome, DispatchError> {
        retry_on_conflict(task_id, self.config.max_commit_retries, move || {
            self.try_transition(task_id, to)
        })
        .await
    }

    async fn try_transition(
        &self,
        task_id: TaskId,
        to: TaskStatus,
    ) -> Result<TransitionOutcome, DispatchError> {
        let task = load_task(&self.store, task_id).await?;
        if task.status == to && to.is_terminal() {
            tracing::debug!(task_id = %task_id, status = %to, "transition already applied");
            return Ok(TransitionOutcome::AlreadyApplied(task));
        }
        if !is_legal_transition(task.kind(), task.status, to) || to == TaskStatus::Pending {
            return Err(invalid(&task, to));
        }

        let variance = count_variance(&task).unwrap_or(0);
        match to {
            TaskStatus::Assigned if task.workers_assigned == 0 => return Err(invalid(&task, to)),
            TaskStatus::Completed if variance != 0 => return Err(invalid(&task, to)),
            TaskStatus::VarianceReview if variance == 0 => return Err(invalid(&task, to)),
            _ => {}
        }

        // Loading shares follow the task: completing closes them, cancelling releases them.
        let mut ops = Vec::new();
        if task.kind().is_multi_assignee() {
            let op: Option<fn(WorkerId) -> AssignmentOp> = match to {
                TaskStatus::Completed => Some(AssignmentOp::Complete),
                TaskStatus::Cancelled => Some(AssignmentOp::Release),
                _ => None,
            };
            if let Some(op) = op {
                ops = active_workers(&self.store, &task)
                    .await?
                    .into_iter()
                    .map(op)
                    .collect();
            }
        }

        let receipt = self
            .store
            .commit(TaskCommit::new(&task, ops, Some(to), now()))
            .await?;
        tracing::info!(
            task_id = %task_id,
            kind = %task.kind(),
            from = %task.status,
            to = %to,
            "task transitioned"
        );
        self.apply_effects(&receipt.task).await?;
        Ok(TransitionOutcome::Applied(receipt.task))
    }

    /// Worker begins (or resumes) their work on a task.
    pub async fn start(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        retry_on_conflict(task_id, self.config.max_commit_retries, move || {
            self.try_start(task_id, worker_id)
        })
        .await
    }

    async fn try_start(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        let task = self.load_for_worker(task_id, worker_id).await?;
        let multi = task.kind().is_multi_assignee();
        let joins_running = multi && task.status == TaskStatus::InProgress;
        if !joins_running && !is_legal_transition(task.kind(), task.status, TaskStatus::InProgress) {
            return Err(invalid(&task, TaskStatus::InProgress));
        }
        let ops = if multi {
            vec![AssignmentOp::Start(worker_id.clone())]
        } else {
            Vec::new()
        };
        let status = (!joins_running).then_some(TaskStatus::InProgress);
        let receipt = self
            .store
            .commit(TaskCommit::new(&task, ops, status, now()))
            .await?;
        tracing::info!(task_id = %task_id, worker = %worker_id, "task started");
        Ok(TransitionOutcome::Applied(receipt.task))
    }

    /// Worker suspends an in-progress task.
    pub async fn pause(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        retry_on_conflict(task_id, self.config.max_commit_retries, move || async move {
            let task = self.load_for_worker(task_id, worker_id).await?;
            if !is_legal_transition(task.kind(), task.status, TaskStatus::Paused) {
                return Err(invalid(&task, TaskStatus::Paused));
            }
            let receipt = self
                .store
                .commit(TaskCommit::new(&task, Vec::new(), Some(TaskStatus::Paused), now()))
                .await?;
            tracing::info!(task_id = %task_id, worker = %worker_id, "task paused");
            Ok(TransitionOutcome::Applied(receipt.task))
        })
        .await
    }

    /// Worker finishes their work on a task.
    ///
    /// For loading work this closes the worker's share; the task completes
    /// once no active share remains. A cycle count whose recorded quantity
    /// differs from the expected one goes to `VARIANCE_REVIEW` instead.
    pub async fn complete(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        retry_on_conflict(task_id, self.config.max_commit_retries, move || {
            self.try_complete(task_id, worker_id)
        })
        .await
    }

    async fn try_complete(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        let task = load_task(&self.store, task_id).await?;
        if task.status == TaskStatus::Completed {
            return Ok(TransitionOutcome::AlreadyApplied(task));
        }
        self.ensure_holder(&task, worker_id).await?;
        let target = if count_variance(&task).is_some_and(|v| v != 0) {
            TaskStatus::VarianceReview
        } else {
            TaskStatus::Completed
        };
        if !is_legal_transition(task.kind(), task.status, target) {
            return Err(invalid(&task, target));
        }

        let (ops, status) = if task.kind().is_multi_assignee() {
            let others = active_workers(&self.store, &task)
                .await?
                .into_iter()
                .filter(|w| w != worker_id)
                .count();
            (
                vec![AssignmentOp::Complete(worker_id.clone())],
                (others == 0).then_some(TaskStatus::Completed),
            )
        } else {
            (Vec::new(), Some(target))
        };

        let receipt = self
            .store
            .commit(TaskCommit::new(&task, ops, status, now()))
            .await?;
        tracing::info!(
            task_id = %task_id,
            worker = %worker_id,
            status = %receipt.task.status,
            "worker completed task"
        );
        if status.is_some() {
            self.apply_effects(&receipt.task).await?;
        }
        Ok(TransitionOutcome::Applied(receipt.task))
    }

    /// Record the quantity counted for a cycle count.
    ///
    /// A match completes the task; a mismatch sends it to `VARIANCE_REVIEW`.
    pub async fn record_count(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
        counted_qty: i64,
    ) -> Result<TransitionOutcome, DispatchError> {
        retry_on_conflict(task_id, self.config.max_commit_retries, move || async move {
            let task = self.load_for_worker(task_id, worker_id).await?;
            let TaskDetail::CycleCount {
                item,
                location,
                expected_qty,
                ..
            } = &task.detail
            else {
                return Err(invalid(&task, TaskStatus::VarianceReview));
            };
            let target = if counted_qty == *expected_qty {
                TaskStatus::Completed
            } else {
                TaskStatus::VarianceReview
            };
            if !is_legal_transition(task.kind(), task.status, target) {
                return Err(invalid(&task, target));
            }
            let detail = TaskDetail::CycleCount {
                item: item.clone(),
                location: location.clone(),
                expected_qty: *expected_qty,
                counted_qty: Some(counted_qty),
            };
            let commit = TaskCommit::new(&task, Vec::new(), Some(target), now()).with_detail(detail);
            let receipt = self.store.commit(commit).await?;
            tracing::info!(
                task_id = %task_id,
                worker = %worker_id,
                expected = *expected_qty,
                counted = counted_qty,
                status = %target,
                "count recorded"
            );
            self.apply_effects(&receipt.task).await?;
            Ok(TransitionOutcome::Applied(receipt.task))
        })
        .await
    }

    /// Approve or reject a cycle-count variance.
    pub async fn review_variance(
        &self,
        task_id: TaskId,
        approve: bool,
    ) -> Result<TransitionOutcome, DispatchError> {
        let to = if approve {
            TaskStatus::Approved
        } else {
            TaskStatus::Rejected
        };
        self.transition(task_id, to).await
    }

    /// Load a task and check that `worker_id` holds an active share of it.
    async fn load_for_worker(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<Task, DispatchError> {
        let task = load_task(&self.store, task_id).await?;
        self.ensure_holder(&task, worker_id).await?;
        Ok(task)
    }

    async fn ensure_holder(&self, task: &Task, worker_id: &WorkerId) -> Result<(), DispatchError> {
        let holds = if task.kind().is_multi_assignee() {
            let filter = AssignmentFilter {
                worker_id: Some(worker_id.clone()),
                ..AssignmentFilter::for_task(task.id).statuses(&AssignmentStatus::ACTIVE)
            };
            self.store.count_assignments(&filter).await? > 0
        } else {
            task.assignee.as_ref() == Some(worker_id)
        };
        if holds {
            return Ok(());
        }
        tracing::warn!(task_id = %task.id, worker = %worker_id, "worker acted on task not assigned to them");
        Err(DispatchError::NotAssigned {
            task_id: task.id,
            worker_id: worker_id.clone(),
        })
    }

    /// Inventory adjustments and movement record for a task that just reached
    /// a completion status. Other statuses have no effects.
    async fn apply_effects(&self, task: &Task) -> Result<(), DispatchError> {
        let adjustments: Vec<(ItemRef, LocationRef, i64, AdjustmentReason)> =
            match (&task.detail, task.status) {
                (TaskDetail::Pick { item, location, quantity }, TaskStatus::Completed) => {
                    vec![(item.clone(), location.clone(), -i64::from(*quantity), AdjustmentReason::Pick)]
                }
                (TaskDetail::PutAway { item, to_location, quantity }, TaskStatus::Completed) => vec![(
                    item.clone(),
                    to_location.clone(),
                    i64::from(*quantity),
                    AdjustmentReason::PutAway,
                )],
                (
                    TaskDetail::CrossDock {
                        item,
                        inbound_dock,
                        outbound_dock,
                        quantity,
                    },
                    TaskStatus::Completed,
                ) => vec![
                    (
                        item.clone(),
                        inbound_dock.clone(),
                        -i64::from(*quantity),
                        AdjustmentReason::CrossDockOut,
                    ),
                    (
                        item.clone(),
                        outbound_dock.clone(),
                        i64::from(*quantity),
                        AdjustmentReason::CrossDockIn,
                    ),
                ],
                (TaskDetail::CycleCount { item, location, .. }, TaskStatus::Approved) => {
                    let delta = count_variance(task).unwrap_or(0);
                    vec![(item.clone(), location.clone(), delta, AdjustmentReason::CycleCount)]
                }
                (_, TaskStatus::Completed | TaskStatus::Approved | TaskStatus::Rejected) => Vec::new(),
                _ => return Ok(()),
            };

        for (item, location, delta, reason) in adjustments {
            if delta == 0 {
                continue;
            }
            self.ledger
                .adjust(InventoryAdjustment {
                    tenant_id: task.tenant_id.clone(),
                    warehouse_id: task.warehouse_id.clone(),
                    item,
                    location,
                    delta,
                    reason,
                    task_id: task.id,
                })
                .await?;
        }
        let record = build_movement_record(task, task.status, None);
        self.movements.lock().record(record);
        tracing::info!(task_id = %task.id, kind = %task.kind(), status = %task.status, "completion effects applied");
        Ok(())
    }
}
