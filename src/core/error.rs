//! Error types for dispatch operations.

use thiserror::Error;

use crate::core::task::{TaskKind, TaskStatus};
use crate::util::ids::{TaskId, WorkerId};

/// Errors produced by dispatch components.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Operation attempted with no tenant context or with a conflicting tenant filter.
    #[error("isolation violation: {0}")]
    IsolationViolation(String),
    /// Entity does not resolve within the current tenant.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (task, worker, assignment).
        entity: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },
    /// Requested status change is not a legal edge for this task kind.
    #[error("invalid transition for {kind} task: {from} -> {to}")]
    InvalidTransition {
        /// Queue the task belongs to.
        kind: TaskKind,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
    /// Assignment would exceed the task's required worker count.
    #[error("capacity exceeded: {assigned} of {required} workers already assigned")]
    CapacityExceeded {
        /// Workers the task requires.
        required: u32,
        /// Workers already holding an active assignment.
        assigned: u32,
    },
    /// Optimistic-lock conflicts persisted past the retry budget.
    #[error("concurrent modification of task {task_id} after {attempts} attempts")]
    ConcurrentModification {
        /// Contended task.
        task_id: TaskId,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// A versioned write lost the compare-and-swap race.
    #[error("version conflict on task {task_id}")]
    VersionConflict {
        /// Contended task.
        task_id: TaskId,
    },
    /// Worker is not assigned to the task they tried to act on.
    #[error("worker {worker_id} is not assigned to task {task_id}")]
    NotAssigned {
        /// Task acted upon.
        task_id: TaskId,
        /// Acting worker.
        worker_id: WorkerId,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl DispatchError {
    /// Shorthand for a `NotFound` on a task id.
    pub fn task_not_found(id: TaskId) -> Self {
        Self::NotFound {
            entity: "task",
            id: id.to_string(),
        }
    }

    /// Shorthand for a `NotFound` on a worker id.
    pub fn worker_not_found(id: &WorkerId) -> Self {
        Self::NotFound {
            entity: "worker",
            id: id.to_string(),
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
