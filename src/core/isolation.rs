//! Tenant isolation interceptor.
//!
//! [`Isolated`] wraps a raw backend and implements the same store traits.
//! Every call resolves the current [`TenantContext`] first and fails closed
//! when none is established:
//!
//! - reads and writes get `tenant_id` injected into their where-clause when
//!   absent; an explicit filter for another tenant is an `IsolationViolation`;
//! - creates have `tenant_id` overwritten unconditionally.
//!
//! The tenant table and unscoped access are reachable only through
//! [`Isolated::admin`], which needs an [`AdminGrant`] that only this crate
//! can mint.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::store::{
    AssignmentFilter, CommitReceipt, TaskCommit, TaskFilter, TaskPatch, TaskStore, WorkerDirectory,
    WorkerFilter,
};
use crate::core::task::{Assignment, NewTask, Task, Worker};
use crate::core::tenant::TenantContext;
use crate::core::DispatchError;
use crate::util::ids::TenantId;

/// Capability for the administrative (unscoped) path.
#[derive(Debug)]
pub struct AdminGrant {
    _private: (),
}

impl AdminGrant {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }
}

/// Resolve the scoped tenant into `slot`, rejecting conflicts.
fn enforce_scope(slot: &mut Option<TenantId>, operation: &str) -> Result<(), DispatchError> {
    let ctx = TenantContext::current().inspect_err(|_| {
        tracing::warn!(operation, "store call rejected: no tenant context");
    })?;
    match slot {
        None => {
            *slot = Some(ctx.tenant_id().clone());
            Ok(())
        }
        Some(explicit) if explicit == ctx.tenant_id() => Ok(()),
        Some(explicit) => {
            tracing::warn!(
                operation,
                scoped = %ctx.tenant_id(),
                requested = %explicit,
                "store call rejected: cross-tenant filter"
            );
            Err(DispatchError::IsolationViolation(format!(
                "{operation} filtered on tenant {explicit} inside scope for {}",
                ctx.tenant_id()
            )))
        }
    }
}

/// Tenant-enforcing wrapper around a backend.
pub struct Isolated<S> {
    inner: Arc<S>,
}

impl<S> Clone for Isolated<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Isolated<S> {
    /// Wrap a backend.
    pub const fn new(inner: Arc<S>) -> Self {
        Self { inner }
    }

    /// Unscoped access to the backend for trusted internal callers.
    pub fn admin(&self, _grant: &AdminGrant) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for Isolated<S> {
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "count_tasks")?;
        self.inner.count_tasks(&filter).await
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "find_tasks")?;
        self.inner.find_tasks(&filter).await
    }

    async fn find_task(&self, filter: &TaskFilter) -> Result<Option<Task>, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "find_task")?;
        self.inner.find_task(&filter).await
    }

    async fn create_task(&self, mut task: NewTask) -> Result<Task, DispatchError> {
        let ctx = TenantContext::current()?;
        task.tenant_id = Some(ctx.tenant_id().clone());
        self.inner.create_task(task).await
    }

    async fn create_task_unless_exists(
        &self,
        existing: &TaskFilter,
        mut task: NewTask,
    ) -> Result<(Task, bool), DispatchError> {
        let mut existing = existing.clone();
        enforce_scope(&mut existing.tenant_id, "create_task_unless_exists")?;
        task.tenant_id.clone_from(&existing.tenant_id);
        self.inner.create_task_unless_exists(&existing, task).await
    }

    async fn update_tasks(
        &self,
        filter: &TaskFilter,
        patch: &TaskPatch,
    ) -> Result<u64, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "update_tasks")?;
        self.inner.update_tasks(&filter, patch).await
    }

    async fn delete_tasks(&self, filter: &TaskFilter) -> Result<u64, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "delete_tasks")?;
        self.inner.delete_tasks(&filter).await
    }

    async fn count_assignments(&self, filter: &AssignmentFilter) -> Result<u64, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "count_assignments")?;
        self.inner.count_assignments(&filter).await
    }

    async fn find_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "find_assignments")?;
        self.inner.find_assignments(&filter).await
    }

    async fn commit(&self, mut commit: TaskCommit) -> Result<CommitReceipt, DispatchError> {
        enforce_scope(&mut commit.tenant_id, "commit")?;
        self.inner.commit(commit).await
    }
}

#[async_trait]
impl<S: WorkerDirectory> WorkerDirectory for Isolated<S> {
    async fn find_workers(&self, filter: &WorkerFilter) -> Result<Vec<Worker>, DispatchError> {
        let mut filter = filter.clone();
        enforce_scope(&mut filter.tenant_id, "find_workers")?;
        self.inner.find_workers(&filter).await
    }
}
