//! Postgres-backed task store (schema and interface stubs).
//!
//! Tenant scoping lives in [`crate::core::isolation::Isolated`], so this
//! adapter only has to honour the `tenant_id` already present in filters.
//! The staffing commit maps onto one transaction guarded by
//! [`PostgresStore::VERSIONED_UPDATE`].

use async_trait::async_trait;

use crate::core::store::{
    AssignmentFilter, CommitReceipt, TaskCommit, TaskFilter, TaskPatch, TaskStore, TenantRegistry,
    WorkerDirectory, WorkerFilter,
};
use crate::core::task::{Assignment, NewTask, Task, Tenant, Worker};
use crate::core::DispatchError;
use crate::util::ids::TenantId;

fn not_wired() -> DispatchError {
    DispatchError::Backend("postgres store not wired to database client".into())
}

/// Postgres store adapter placeholder.
#[derive(Debug, Clone, Default)]
pub struct PostgresStore {
    schema: String,
}

impl PostgresStore {
    /// Compare-and-swap on the task row; zero rows updated means a version conflict.
    pub const VERSIONED_UPDATE: &'static str = r"
UPDATE wd_tasks
   SET status = $3, assignee = $4, workers_assigned = $5, detail = $6,
       started_at = $7, completed_at = $8, version = version + 1
 WHERE tenant_id = $1 AND id = $2 AND version = $9
";

    /// Create an adapter bound to a schema.
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// Schema the tables live in.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Migration statements for tenants, tasks and loading assignments.
    pub fn migrations() -> &'static [&'static str] {
        &[
            r"
CREATE TABLE IF NOT EXISTS wd_tenants (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
",
            r"
CREATE TABLE IF NOT EXISTS wd_tasks (
    id UUID PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES wd_tenants (id),
    warehouse_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    assignee TEXT,
    required_workers INT NOT NULL DEFAULT 1 CHECK (required_workers BETWEEN 1 AND 4),
    workers_assigned INT NOT NULL DEFAULT 0 CHECK (workers_assigned <= required_workers),
    version BIGINT NOT NULL DEFAULT 0,
    detail JSONB NOT NULL,
    scheduled_start TIMESTAMPTZ,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_wd_tasks_tenant_kind_status ON wd_tasks (tenant_id, kind, status);
CREATE INDEX IF NOT EXISTS idx_wd_tasks_tenant_assignee ON wd_tasks (tenant_id, assignee, status);
CREATE INDEX IF NOT EXISTS idx_wd_tasks_tenant_completed ON wd_tasks (tenant_id, completed_at);
CREATE INDEX IF NOT EXISTS idx_wd_tasks_tenant_scheduled ON wd_tasks (tenant_id, warehouse_id, scheduled_start);
CREATE UNIQUE INDEX IF NOT EXISTS idx_wd_tasks_loading_shipment
    ON wd_tasks (tenant_id, (detail->>'shipment'), (detail->>'direction')) WHERE kind = 'loading';
",
            r"
CREATE TABLE IF NOT EXISTS wd_assignments (
    id UUID PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES wd_tenants (id),
    task_id UUID NOT NULL REFERENCES wd_tasks (id) ON DELETE CASCADE,
    worker_id TEXT NOT NULL,
    status TEXT NOT NULL,
    assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_wd_assignments_active
    ON wd_assignments (task_id, worker_id) WHERE status IN ('ASSIGNED', 'IN_PROGRESS');
CREATE INDEX IF NOT EXISTS idx_wd_assignments_tenant_worker ON wd_assignments (tenant_id, worker_id, status);
CREATE INDEX IF NOT EXISTS idx_wd_assignments_tenant_completed ON wd_assignments (tenant_id, completed_at);
",
        ]
    }
}

#[async_trait]
impl TaskStore for PostgresStore {
    async fn count_tasks(&self, _filter: &TaskFilter) -> Result<u64, DispatchError> {
        Err(not_wired())
    }

    async fn find_tasks(&self, _filter: &TaskFilter) -> Result<Vec<Task>, DispatchError> {
        Err(not_wired())
    }

    async fn create_task(&self, _task: NewTask) -> Result<Task, DispatchError> {
        Err(not_wired())
    }

    /// Maps onto `INSERT ... ON CONFLICT DO NOTHING` against
    /// `idx_wd_tasks_loading_shipment`, then a select of the surviving row.
    async fn create_task_unless_exists(
        &self,
        _existing: &TaskFilter,
        _task: NewTask,
    ) -> Result<(Task, bool), DispatchError> {
        Err(not_wired())
    }

    async fn update_tasks(
        &self,
        _filter: &TaskFilter,
        _patch: &TaskPatch,
    ) -> Result<u64, DispatchError> {
        Err(not_wired())
    }

    async fn delete_tasks(&self, _filter: &TaskFilter) -> Result<u64, DispatchError> {
        Err(not_wired())
    }

    async fn count_assignments(&self, _filter: &AssignmentFilter) -> Result<u64, DispatchError> {
        Err(not_wired())
    }

    async fn find_assignments(
        &self,
        _filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, DispatchError> {
        Err(not_wired())
    }

    async fn commit(&self, _commit: TaskCommit) -> Result<CommitReceipt, DispatchError> {
        Err(not_wired())
    }
}

#[async_trait]
impl WorkerDirectory for PostgresStore {
    async fn find_workers(&self, _filter: &WorkerFilter) -> Result<Vec<Worker>, DispatchError> {
        Err(not_wired())
    }
}

#[async_trait]
impl TenantRegistry for PostgresStore {
    async fn upsert_tenant(&self, _tenant: Tenant) -> Result<(), DispatchError> {
        Err(not_wired())
    }

    async fn find_tenant(&self, _id: &TenantId) -> Result<Option<Tenant>, DispatchError> {
        Err(not_wired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_business_table_carries_tenant_column() {
        let sql = PostgresStore::migrations().join("\n");
        for table in ["wd_tasks", "wd_assignments"] {
            let start = sql.find(&format!("CREATE TABLE IF NOT EXISTS {table}")).unwrap();
            let body = &sql[start..];
            let end = body.find(");").unwrap();
            assert!(body[..end].contains("tenant_id TEXT NOT NULL"), "{table}");
        }
        assert!(sql.contains("version BIGINT NOT NULL"));
    }

    #[test]
    fn test_versioned_update_guards_on_tenant_and_version() {
        let sql = PostgresStore::VERSIONED_UPDATE;
        assert!(sql.contains("tenant_id = $1"));
        assert!(sql.contains("version = $9"));
    }

    #[test]
    fn test_loading_tasks_are_unique_per_shipment_and_direction() {
        let sql = PostgresStore::migrations().join("\n");
        assert!(sql.contains(
            "ON wd_tasks (tenant_id, (detail->>'shipment'), (detail->>'direction')) WHERE kind = 'loading'"
        ));
    }

    #[tokio::test]
    async fn test_unwired_calls_surface_backend_error() {
        let store = PostgresStore::new("public");
        assert_eq!(store.schema(), "public");
        assert!(matches!(
            store.count_tasks(&TaskFilter::default()).await,
            Err(DispatchError::Backend(_))
        ));
    }
}
