//! Assignment engine.
//!
//! Fills a task's worker requirement with the least-loaded eligible workers.
//! Every staffing change is one versioned [`TaskCommit`]: the engine reads the
//! task, decides, and commits against the version it read. A lost race comes
//! back as `VersionConflict` and the whole read-decide-commit step is retried,
//! so two concurrent callers can never both fill the same open slot.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::core::store::{
    AssignmentFilter, AssignmentOp, TaskCommit, TaskFilter, TaskStore, WorkerDirectory,
    WorkerFilter,
};
use crate::core::task::{AssignmentStatus, Task, TaskStatus};
use crate::core::workload::WorkloadAggregator;
use crate::core::DispatchError;
use crate::util::clock::now;
use crate::util::ids::{TaskId, WorkerId};

/// Result of an assignment-engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignOutcome {
    /// Task acted on.
    pub task_id: TaskId,
    /// Workers added (or removed, for `unassign`) by this call.
    pub workers: Vec<WorkerId>,
    /// Number of workers added by this call; zero means nothing changed.
    pub assigned_count: usize,
    /// Active staffing after the call.
    pub workers_assigned: u32,
    /// Staffing requirement.
    pub required_workers: u32,
    /// Task status after the call.
    pub status: TaskStatus,
    /// Whether the call wrote anything.
    pub changed: bool,
}

impl AssignOutcome {
    fn unchanged(task: &Task) -> Self {
        Self {
            task_id: task.id,
            workers: Vec::new(),
            assigned_count: 0,
            workers_assigned: task.workers_assigned,
            required_workers: task.required_workers,
            status: task.status,
            changed: false,
        }
    }

    fn applied(task: &Task, workers: Vec<WorkerId>, assigned_count: usize) -> Self {
        Self {
            task_id: task.id,
            workers,
            assigned_count,
            workers_assigned: task.workers_assigned,
            required_workers: task.required_workers,
            status: task.status,
            changed: true,
        }
    }
}

/// Run `attempt` until it stops losing version races, at most `max_attempts` times.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    task_id: TaskId,
    max_attempts: u32,
    mut attempt: F,
) -> Result<T, DispatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DispatchError>>,
{
    for n in 1..=max_attempts {
        match attempt().await {
            Err(DispatchError::VersionConflict { .. }) => {
                tracing::debug!(task_id = %task_id, attempt = n, "version conflict, retrying");
                tokio::task::yield_now().await;
            }
            other => return other,
        }
    }
    tracing::warn!(task_id = %task_id, attempts = max_attempts, "gave up after version conflicts");
    Err(DispatchError::ConcurrentModification {
        task_id,
        attempts: max_attempts,
    })
}

/// Load a task in the current tenant or fail with `NotFound`.
pub(crate) async fn load_task<S: TaskStore>(store: &S, task_id: TaskId) -> Result<Task, DispatchError> {
    store
        .find_task(&TaskFilter::by_id(task_id))
        .await?
        .ok_or_else(|| DispatchError::task_not_found(task_id))
}

/// Workers holding an active share of `task`.
pub(crate) async fn active_workers<S: TaskStore>(
    store: &S,
    task: &Task,
) -> Result<Vec<WorkerId>, DispatchError> {
    if !task.kind().is_multi_assignee() {
        return Ok(task.assignee.iter().cloned().collect());
    }
    let filter = AssignmentFilter::for_task(task.id).statuses(&AssignmentStatus::ACTIVE);
    Ok(store
        .find_assignments(&filter)
        .await?
        .into_iter()
        .map(|a| a.worker_id)
        .collect())
}

/// Greedy least-loaded assignment with optimistic concurrency.
pub struct AssignmentEngine<S> {
    store: S,
    workload: WorkloadAggregator<S>,
    config: Arc<DispatchConfig>,
}

impl<S: Clone> Clone for AssignmentEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            workload: self.workload.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> AssignmentEngine<S>
where
    S: TaskStore + WorkerDirectory + Clone,
{
    /// Create an engine; the aggregator shares the store and config.
    pub fn new(store: S, config: Arc<DispatchConfig>) -> Self {
        let workload = WorkloadAggregator::new(store.clone(), Arc::clone(&config));
        Self {
            store,
            workload,
            config,
        }
    }

    /// Aggregator used for ranking.
    pub const fn workload(&self) -> &WorkloadAggregator<S> {
        &self.workload
    }

    /// Staff a `PENDING` task with the least-loaded eligible workers.
    ///
    /// Tasks in any other status are left alone. An empty candidate list is
    /// reported as `assigned_count == 0`, not as an error.
    pub async fn auto_assign(&self, task_id: TaskId) -> Result<AssignOutcome, DispatchError> {
        retry_on_conflict(task_id, self.config.max_commit_retries, move || {
            self.try_auto_assign(task_id)
        })
        .await
    }

    async fn try_auto_assign(&self, task_id: TaskId) -> Result<AssignOutcome, DispatchError> {
        let task = load_task(&self.store, task_id).await?;
        if task.status != TaskStatus::Pending {
            tracing::debug!(task_id = %task_id, status = %task.status, "auto-assign skipped");
            return Ok(AssignOutcome::unchanged(&task));
        }
        let needed = task.workers_needed() as usize;
        if needed == 0 {
            return Ok(AssignOutcome::unchanged(&task));
        }

        let already = active_workers(&self.store, &task).await?;
        let candidates = self
            .workload
            .list_available_workers(&task.warehouse_id, None, None)
            .await?;
        let chosen: Vec<WorkerId> = candidates
            .into_iter()
            .map(|r| r.worker.id)
            .filter(|id| !already.contains(id))
            .take(needed)
            .collect();
        if chosen.is_empty() {
            tracing::info!(
                task_id = %task_id,
                warehouse = %task.warehouse_id,
                "no eligible workers; task stays pending"
            );
            return Ok(AssignOutcome::unchanged(&task));
        }

        let staffed = task.workers_assigned as usize + chosen.len() >= task.required_workers as usize;
        let status = staffed.then_some(TaskStatus::Assigned);
        let ops = chosen.iter().cloned().map(AssignmentOp::Assign).collect();
        let receipt = self
            .store
            .commit(TaskCommit::new(&task, ops, status, now()))
            .await?;
        tracing::info!(
            task_id = %task_id,
            kind = %receipt.task.kind(),
            assigned = chosen.len(),
            workers_assigned = receipt.task.workers_assigned,
            required = receipt.task.required_workers,
            status = %receipt.task.status,
            "workers auto-assigned"
        );
        let count = chosen.len();
        Ok(AssignOutcome::applied(&receipt.task, chosen, count))
    }

    /// Assign a specific worker, bypassing selection.
    ///
    /// The worker must belong to the task's warehouse; any role may be
    /// staffed this way. Re-assigning a worker who already holds the task is
    /// a no-op. Assigning past `required_workers` fails with
    /// `CapacityExceeded` and writes nothing.
    pub async fn assign_worker(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<AssignOutcome, DispatchError> {
        let task = load_task(&self.store, task_id).await?;
        let filter = WorkerFilter {
            id: Some(worker_id.clone()),
            warehouse_id: Some(task.warehouse_id.clone()),
            ..WorkerFilter::default()
        };
        if self.store.find_workers(&filter).await?.is_empty() {
            tracing::warn!(
                task_id = %task_id,
                worker = %worker_id,
                warehouse = %task.warehouse_id,
                "manual assignment rejected: worker not in warehouse"
            );
            return Err(DispatchError::worker_not_found(worker_id));
        }
        retry_on_conflict(task_id, self.config.max_commit_retries, move || {
            self.try_assign_worker(task_id, worker_id)
        })
        .await
    }

    async fn try_assign_worker(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<AssignOutcome, DispatchError> {
        let task = load_task(&self.store, task_id).await?;
        if task.status.is_terminal() {
            return Err(DispatchError::InvalidTransition {
                kind: task.kind(),
                from: task.status,
                to: TaskStatus::Assigned,
            });
        }
        if active_workers(&self.store, &task).await?.contains(worker_id) {
            return Ok(AssignOutcome::unchanged(&task));
        }
        if task.is_fully_staffed() {
            tracing::warn!(
                task_id = %task_id,
                worker = %worker_id,
                required = task.required_workers,
                "assignment rejected: task fully staffed"
            );
            return Err(DispatchError::CapacityExceeded {
                required: task.required_workers,
                assigned: task.workers_assigned,
            });
        }

        let staffed = task.workers_assigned + 1 >= task.required_workers;
        let status = (task.status == TaskStatus::Pending && staffed).then_some(TaskStatus::Assigned);
        let commit = TaskCommit::new(
            &task,
            vec![AssignmentOp::Assign(worker_id.clone())],
            status,
            now(),
        );
        let receipt = self.store.commit(commit).await?;
        tracing::info!(
            task_id = %task_id,
            worker = %worker_id,
            workers_assigned = receipt.task.workers_assigned,
            status = %receipt.task.status,
            "worker assigned"
        );
        Ok(AssignOutcome::applied(&receipt.task, vec![worker_id.clone()], 1))
    }

    /// Remove a worker's active share of a task.
    ///
    /// The task falls back to `PENDING` if it was fully staffed or no active
    /// staffing remains.
    pub async fn unassign(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<AssignOutcome, DispatchError> {
        retry_on_conflict(task_id, self.config.max_commit_retries, move || {
            self.try_unassign(task_id, worker_id)
        })
        .await
    }

    async fn try_unassign(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<AssignOutcome, DispatchError> {
        let task = load_task(&self.store, task_id).await?;
        if task.status.is_terminal() {
            return Err(DispatchError::InvalidTransition {
                kind: task.kind(),
                from: task.status,
                to: TaskStatus::Pending,
            });
        }
        if !active_workers(&self.store, &task).await?.contains(worker_id) {
            return Err(DispatchError::NotAssigned {
                task_id,
                worker_id: worker_id.clone(),
            });
        }

        let remaining = task.workers_assigned.saturating_sub(1);
        let status = (task.status == TaskStatus::Assigned || remaining == 0)
            .then_some(TaskStatus::Pending)
            .filter(|s| *s != task.status);
        let commit = TaskCommit::new(
            &task,
            vec![AssignmentOp::Release(worker_id.clone())],
            status,
            now(),
        );
        let receipt = self.store.commit(commit).await?;
        tracing::info!(
            task_id = %task_id,
            worker = %worker_id,
            workers_assigned = receipt.task.workers_assigned,
            status = %receipt.task.status,
            "worker unassigned"
        );
        Ok(AssignOutcome::applied(&receipt.task, vec![worker_id.clone()], 0))
    }
}
