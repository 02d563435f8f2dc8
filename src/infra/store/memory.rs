//! In-memory task store for development and testing.
//!
//! All tables sit behind one `parking_lot::RwLock`. Reads share the lock;
//! commits take it exclusively, which serializes the version check and the
//! staffing write for a task the same way a row lock would.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::core::store::{
    AssignmentFilter, AssignmentOp, CommitReceipt, TaskCommit, TaskFilter, TaskPatch, TaskStore,
    TenantRegistry, WorkerDirectory, WorkerFilter,
};
use crate::core::task::{Assignment, AssignmentStatus, NewTask, Task, TaskStatus, Tenant, Worker};
use crate::core::DispatchError;
use crate::util::clock::now;
use crate::util::ids::{AssignmentId, TaskId, TenantId, WorkerId};

#[derive(Default)]
struct Tables {
    tenants: HashMap<TenantId, Tenant>,
    workers: Vec<Worker>,
    tasks: HashMap<TaskId, Task>,
    assignments: Vec<Assignment>,
}

/// In-memory backend implementing every store capability.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    io_yield: bool,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler at the start of every call, like a networked backend would.
    #[must_use]
    pub fn with_io_yield(mut self) -> Self {
        self.io_yield = true;
        self
    }

    /// Seed a worker into the directory.
    pub fn insert_worker(&self, worker: Worker) {
        self.tables.write().workers.push(worker);
    }

    /// Total rows across all tenants; test and diagnostics helper.
    pub fn task_count_unscoped(&self) -> usize {
        self.tables.read().tasks.len()
    }

    async fn io(&self) {
        if self.io_yield {
            tokio::task::yield_now().await;
        }
    }
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    tasks
}

fn not_assigned(task: &Task, worker_id: &WorkerId) -> DispatchError {
    DispatchError::NotAssigned {
        task_id: task.id,
        worker_id: worker_id.clone(),
    }
}

fn active_for(rows: &[Assignment], worker_id: &WorkerId) -> Option<usize> {
    rows.iter()
        .position(|a| a.status.is_active() && a.worker_id == *worker_id)
}

/// Apply one staffing op to the staged rows of a multi-assignee task.
fn apply_multi(
    task: &Task,
    staged: &mut Vec<Assignment>,
    removed: &mut Vec<Assignment>,
    op: &AssignmentOp,
    at: DateTime<Utc>,
) -> Result<(), DispatchError> {
    match op {
        AssignmentOp::Assign(worker_id) => {
            if active_for(staged, worker_id).is_some() {
                return Err(DispatchError::Backend(format!(
                    "worker {worker_id} already holds an active assignment on task {}",
                    task.id
                )));
            }
            staged.push(Assignment {
                id: AssignmentId::generate(),
                tenant_id: task.tenant_id.clone(),
                task_id: task.id,
                worker_id: worker_id.clone(),
                status: AssignmentStatus::Assigned,
                assigned_at: at,
                started_at: None,
                completed_at: None,
            });
        }
        AssignmentOp::Release(worker_id) => {
            let idx = active_for(staged, worker_id).ok_or_else(|| not_assigned(task, worker_id))?;
            removed.push(staged.remove(idx));
        }
        AssignmentOp::Start(worker_id) => {
            let idx = active_for(staged, worker_id).ok_or_else(|| not_assigned(task, worker_id))?;
            let row = &mut staged[idx];
            row.status = AssignmentStatus::InProgress;
            row.started_at.get_or_insert(at);
        }
        AssignmentOp::Complete(worker_id) => {
            let idx = active_for(staged, worker_id).ok_or_else(|| not_assigned(task, worker_id))?;
            let row = &mut staged[idx];
            row.status = AssignmentStatus::Completed;
            row.started_at.get_or_insert(at);
            row.completed_at = Some(at);
        }
    }
    Ok(())
}

/// Apply one staffing op to a single-assignee task.
fn apply_single(task: &mut Task, op: &AssignmentOp) -> Result<(), DispatchError> {
    match op {
        AssignmentOp::Assign(worker_id) => match &task.assignee {
            Some(current) if current != worker_id => Err(DispatchError::CapacityExceeded {
                required: task.required_workers,
                assigned: task.workers_assigned,
            }),
            _ => {
                task.assignee = Some(worker_id.clone());
                Ok(())
            }
        },
        AssignmentOp::Release(worker_id) => {
            if task.assignee.as_ref() != Some(worker_id) {
                return Err(not_assigned(task, worker_id));
            }
            task.assignee = None;
            Ok(())
        }
        AssignmentOp::Start(worker_id) | AssignmentOp::Complete(worker_id) => {
            if task.assignee.as_ref() == Some(worker_id) {
                Ok(())
            } else {
                Err(not_assigned(task, worker_id))
            }
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, DispatchError> {
        self.io().await;
        let tables = self.tables.read();
        Ok(tables.tasks.values().filter(|t| filter.matches(t)).count() as u64)
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DispatchError> {
        self.io().await;
        let tables = self.tables.read();
        let found = tables
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        Ok(sorted(found))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, DispatchError> {
        self.io().await;
        let tenant_id = task.tenant_id.clone().ok_or_else(|| {
            DispatchError::IsolationViolation("task created without a tenant".into())
        })?;
        let row = task.into_task(tenant_id, now());
        self.tables.write().tasks.insert(row.id, row.clone());
        tracing::debug!(task_id = %row.id, kind = %row.kind(), "task created");
        Ok(row)
    }

    async fn create_task_unless_exists(
        &self,
        existing: &TaskFilter,
        task: NewTask,
    ) -> Result<(Task, bool), DispatchError> {
        self.io().await;
        let tenant_id = task.tenant_id.clone().ok_or_else(|| {
            DispatchError::IsolationViolation("task created without a tenant".into())
        })?;
        let mut tables = self.tables.write();
        let found = tables
            .tasks
            .values()
            .filter(|t| existing.matches(t))
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if let Some(task) = found {
            return Ok((task.clone(), false));
        }
        let row = task.into_task(tenant_id, now());
        tables.tasks.insert(row.id, row.clone());
        tracing::debug!(task_id = %row.id, kind = %row.kind(), "task created");
        Ok((row, true))
    }

    async fn update_tasks(
        &self,
        filter: &TaskFilter,
        patch: &TaskPatch,
    ) -> Result<u64, DispatchError> {
        self.io().await;
        let mut tables = self.tables.write();
        let mut touched = 0;
        for task in tables.tasks.values_mut().filter(|t| filter.matches(t)) {
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(at) = patch.scheduled_start {
                task.scheduled_start = Some(at);
            }
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete_tasks(&self, filter: &TaskFilter) -> Result<u64, DispatchError> {
        self.io().await;
        let mut tables = self.tables.write();
        let doomed: Vec<TaskId> = tables
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .map(|t| t.id)
            .collect();
        for id in &doomed {
            tables.tasks.remove(id);
        }
        tables.assignments.retain(|a| !doomed.contains(&a.task_id));
        Ok(doomed.len() as u64)
    }

    async fn count_assignments(&self, filter: &AssignmentFilter) -> Result<u64, DispatchError> {
        self.io().await;
        let tables = self.tables.read();
        Ok(tables.assignments.iter().filter(|a| filter.matches(a)).count() as u64)
    }

    async fn find_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, DispatchError> {
        self.io().await;
        let tables = self.tables.read();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: TaskCommit) -> Result<CommitReceipt, DispatchError> {
        self.io().await;
        let mut tables = self.tables.write();
        let Tables {
            tasks, assignments, ..
        } = &mut *tables;

        let current = tasks
            .get(&commit.task_id)
            .filter(|t| commit.tenant_id.as_ref().is_none_or(|id| *id == t.tenant_id))
            .ok_or_else(|| DispatchError::task_not_found(commit.task_id))?;
        if current.version != commit.expected_version {
            return Err(DispatchError::VersionConflict {
                task_id: commit.task_id,
            });
        }

        // Stage everything; nothing is written unless every check passes.
        let mut next = current.clone();
        let multi = next.kind().is_multi_assignee();
        let mut staged: Vec<Assignment> = assignments
            .iter()
            .filter(|a| a.task_id == next.id)
            .cloned()
            .collect();
        let before = staged.clone();
        let mut removed = Vec::new();
        for op in &commit.ops {
            if multi {
                apply_multi(&next, &mut staged, &mut removed, op, commit.at)?;
            } else {
                apply_single(&mut next, op)?;
            }
        }

        next.workers_assigned = if multi {
            staged.iter().filter(|a| a.status.is_active()).count() as u32
        } else {
            u32::from(next.assignee.is_some())
        };
        if next.workers_assigned > next.required_workers {
            return Err(DispatchError::CapacityExceeded {
                required: current.required_workers,
                assigned: current.workers_assigned,
            });
        }

        if let Some(detail) = commit.detail {
            if detail.kind() != next.kind() {
                return Err(DispatchError::Backend(format!(
                    "cannot replace {} payload with {}",
                    next.kind(),
                    detail.kind()
                )));
            }
            next.detail = detail;
        }
        if let Some(status) = commit.status {
            next.status = status;
            match status {
                TaskStatus::InProgress => {
                    next.started_at.get_or_insert(commit.at);
                }
                TaskStatus::Completed | TaskStatus::VarianceReview => {
                    next.completed_at = Some(commit.at);
                }
                _ => {}
            }
        }
        next.version += 1;

        let mut changed: Vec<Assignment> = staged
            .iter()
            .filter(|row| !before.contains(row))
            .cloned()
            .collect();
        changed.extend(removed);

        assignments.retain(|a| a.task_id != next.id);
        assignments.extend(staged);
        tasks.insert(next.id, next.clone());

        Ok(CommitReceipt {
            task: next,
            assignments: changed,
        })
    }
}

#[async_trait]
impl WorkerDirectory for InMemoryStore {
    async fn find_workers(&self, filter: &WorkerFilter) -> Result<Vec<Worker>, DispatchError> {
        self.io().await;
        let tables = self.tables.read();
        Ok(tables
            .workers
            .iter()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TenantRegistry for InMemoryStore {
    async fn upsert_tenant(&self, tenant: Tenant) -> Result<(), DispatchError> {
        self.tables.write().tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    async fn find_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, DispatchError> {
        Ok(self.tables.read().tenants.get(id).cloned())
    }
}
