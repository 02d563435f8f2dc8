//! Dispatcher facade.
//!
//! Owns one tenant-isolated view of a backend and the aggregator, engine and
//! lifecycle built on it. Every operation except tenant registration must run
//! inside a tenant unit of work, see [`Dispatcher::within`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::core::assignment::{load_task, AssignOutcome, AssignmentEngine};
use crate::core::audit::SharedMovementSink;
use crate::core::inventory::InventoryLedger;
use crate::core::isolation::{AdminGrant, Isolated};
use crate::core::lifecycle::{TaskLifecycle, TransitionOutcome};
use crate::core::loading::{LoadingPlan, ShipmentProfile};
use crate::core::store::{TaskFilter, TaskPatch, TaskStore, TenantRegistry, WorkerDirectory};
use crate::core::task::{LoadingDirection, NewTask, Task, TaskKind, TaskStatus, Tenant, WorkerRole};
use crate::core::tenant::{scope, TenantContext};
use crate::core::workload::{RankedWorker, WorkloadSnapshot};
use crate::core::DispatchError;
use crate::util::clock::now;
use crate::util::ids::{Priority, TaskId, TenantId, WarehouseId, WorkerId};

/// Result of creating dock work for a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingTaskOutcome {
    /// The dock task (new or pre-existing).
    pub task: Task,
    /// Whether this call created it.
    pub created: bool,
    /// Staffing result, when the task was just created.
    pub assignment: Option<AssignOutcome>,
}

/// Per-status task counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// All matching tasks.
    pub total: u64,
    /// Count per status; statuses with no tasks are omitted.
    pub by_status: BTreeMap<TaskStatus, u64>,
}

/// Entry point for tenant-scoped dispatch operations.
pub struct Dispatcher<B> {
    store: Isolated<B>,
    engine: AssignmentEngine<Isolated<B>>,
    lifecycle: TaskLifecycle<Isolated<B>>,
    config: Arc<DispatchConfig>,
    grant: AdminGrant,
}

impl<B> Dispatcher<B>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    /// Wire a dispatcher over `backend`.
    pub fn new(
        backend: Arc<B>,
        ledger: Arc<dyn InventoryLedger>,
        movements: SharedMovementSink,
        config: DispatchConfig,
    ) -> Self {
        let config = Arc::new(config);
        let store = Isolated::new(backend);
        Self {
            engine: AssignmentEngine::new(store.clone(), Arc::clone(&config)),
            lifecycle: TaskLifecycle::new(store.clone(), ledger, movements, Arc::clone(&config)),
            store,
            config,
            grant: AdminGrant::new(),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Tenant-isolated store view.
    pub const fn store(&self) -> &Isolated<B> {
        &self.store
    }

    /// Add or rename a tenant (administrative path).
    pub async fn register_tenant(&self, tenant: Tenant) -> Result<(), DispatchError> {
        tracing::info!(tenant = %tenant.id, "tenant registered");
        self.store.admin(&self.grant).upsert_tenant(tenant).await
    }

    /// Build a context for a registered tenant.
    pub async fn begin(&self, tenant_id: &TenantId) -> Result<TenantContext, DispatchError> {
        let ctx = TenantContext::begin(tenant_id.clone())?;
        if self.store.admin(&self.grant).find_tenant(tenant_id).await?.is_none() {
            return Err(DispatchError::NotFound {
                entity: "tenant",
                id: tenant_id.to_string(),
            });
        }
        Ok(ctx)
    }

    /// Run `fut` as a unit of work for `tenant_id`.
    pub async fn within<F, T>(&self, tenant_id: &TenantId, fut: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, DispatchError>>,
    {
        let ctx = self.begin(tenant_id).await?;
        scope(ctx, fut).await?
    }

    /// Create a task in the current tenant. Staffing is left to the caller.
    pub async fn create_task(&self, task: NewTask) -> Result<Task, DispatchError> {
        let task = self.store.create_task(task).await?;
        tracing::info!(task_id = %task.id, kind = %task.kind(), warehouse = %task.warehouse_id, "task created");
        Ok(task)
    }

    /// Fetch a task in the current tenant.
    pub async fn task(&self, task_id: TaskId) -> Result<Task, DispatchError> {
        load_task(&self.store, task_id).await
    }

    /// Current load of a worker.
    pub async fn compute_workload(
        &self,
        worker_id: &WorkerId,
    ) -> Result<WorkloadSnapshot, DispatchError> {
        self.engine.workload().compute_workload(worker_id).await
    }

    /// Load of a worker, with the workday taken from `at`.
    pub async fn compute_workload_at(
        &self,
        worker_id: &WorkerId,
        at: DateTime<Utc>,
    ) -> Result<WorkloadSnapshot, DispatchError> {
        self.engine.workload().compute_workload_at(worker_id, at).await
    }

    /// Workers below the overload cap, least loaded first.
    pub async fn list_available_workers(
        &self,
        warehouse_id: &WarehouseId,
        role: Option<WorkerRole>,
        overload_cap: Option<u32>,
    ) -> Result<Vec<RankedWorker>, DispatchError> {
        self.engine
            .workload()
            .list_available_workers(warehouse_id, role, overload_cap)
            .await
    }

    /// See [`AssignmentEngine::auto_assign`].
    pub async fn auto_assign(&self, task_id: TaskId) -> Result<AssignOutcome, DispatchError> {
        self.engine.auto_assign(task_id).await
    }

    /// See [`AssignmentEngine::assign_worker`].
    pub async fn assign_worker(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<AssignOutcome, DispatchError> {
        self.engine.assign_worker(task_id, worker_id).await
    }

    /// See [`AssignmentEngine::unassign`].
    pub async fn unassign(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<AssignOutcome, DispatchError> {
        self.engine.unassign(task_id, worker_id).await
    }

    /// See [`TaskLifecycle::transition`].
    pub async fn transition(
        &self,
        task_id: TaskId,
        to: TaskStatus,
    ) -> Result<TransitionOutcome, DispatchError> {
        self.lifecycle.transition(task_id, to).await
    }

    /// See [`TaskLifecycle::start`].
    pub async fn start(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        self.lifecycle.start(task_id, worker_id).await
    }

    /// See [`TaskLifecycle::pause`].
    pub async fn pause(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        self.lifecycle.pause(task_id, worker_id).await
    }

    /// See [`TaskLifecycle::complete`].
    pub async fn complete(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
    ) -> Result<TransitionOutcome, DispatchError> {
        self.lifecycle.complete(task_id, worker_id).await
    }

    /// See [`TaskLifecycle::record_count`].
    pub async fn record_count(
        &self,
        task_id: TaskId,
        worker_id: &WorkerId,
        counted_qty: i64,
    ) -> Result<TransitionOutcome, DispatchError> {
        self.lifecycle.record_count(task_id, worker_id, counted_qty).await
    }

    /// See [`TaskLifecycle::review_variance`].
    pub async fn review_variance(
        &self,
        task_id: TaskId,
        approve: bool,
    ) -> Result<TransitionOutcome, DispatchError> {
        self.lifecycle.review_variance(task_id, approve).await
    }

    /// Create dock work for a shipment and staff it.
    ///
    /// Idempotent per shipment and direction: an existing task is returned
    /// untouched.
    pub async fn create_loading_task(
        &self,
        profile: &ShipmentProfile,
        direction: LoadingDirection,
    ) -> Result<LoadingTaskOutcome, DispatchError> {
        let existing = TaskFilter::of_kind(TaskKind::Loading)
            .shipment(profile.shipment.clone(), direction);
        let plan = LoadingPlan::for_shipment(profile, direction);
        let (task, created) = self
            .store
            .create_task_unless_exists(&existing, plan.to_new_task(profile))
            .await?;
        if !created {
            tracing::debug!(task_id = %task.id, shipment = %profile.shipment, "dock task already exists");
            return Ok(LoadingTaskOutcome {
                task,
                created: false,
                assignment: None,
            });
        }
        tracing::info!(task_id = %task.id, kind = %task.kind(), warehouse = %task.warehouse_id, "task created");
        let assignment = self.engine.auto_assign(task.id).await?;
        let task = load_task(&self.store, task.id).await?;
        Ok(LoadingTaskOutcome {
            task,
            created: true,
            assignment: Some(assignment),
        })
    }

    /// Task counts per status in a warehouse, optionally for one queue.
    pub async fn task_stats(
        &self,
        warehouse_id: &WarehouseId,
        kind: Option<TaskKind>,
    ) -> Result<TaskStats, DispatchError> {
        let filter = TaskFilter {
            kind,
            ..TaskFilter::default()
        }
        .warehouse(warehouse_id.clone());
        let tasks = self.store.find_tasks(&filter).await?;
        let mut stats = TaskStats::default();
        for task in tasks {
            stats.total += 1;
            *stats.by_status.entry(task.status).or_insert(0) += 1;
        }
        Ok(stats)
    }

    /// Unfinished tasks whose planned start is before `at`, earliest first.
    pub async fn overdue_tasks(
        &self,
        warehouse_id: &WarehouseId,
        kind: Option<TaskKind>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Task>, DispatchError> {
        let open: Vec<TaskStatus> = TaskStatus::ALL
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect();
        let filter = TaskFilter {
            kind,
            ..TaskFilter::default()
        }
        .warehouse(warehouse_id.clone())
        .statuses(&open)
        .scheduled_before(at);
        let mut tasks = self.store.find_tasks(&filter).await?;
        tasks.sort_by_key(|t| (t.scheduled_start, t.created_at));
        Ok(tasks)
    }

    /// Unfinished tasks overdue as of now.
    pub async fn overdue_tasks_now(
        &self,
        warehouse_id: &WarehouseId,
        kind: Option<TaskKind>,
    ) -> Result<Vec<Task>, DispatchError> {
        self.overdue_tasks(warehouse_id, kind, now()).await
    }

    /// Change a task's priority. Unversioned: the last writer wins.
    pub async fn set_priority(&self, task_id: TaskId, priority: Priority) -> Result<(), DispatchError> {
        let patch = TaskPatch {
            priority: Some(priority),
            ..TaskPatch::default()
        };
        let touched = self.store.update_tasks(&TaskFilter::by_id(task_id), &patch).await?;
        if touched == 0 {
            return Err(DispatchError::task_not_found(task_id));
        }
        tracing::debug!(task_id = %task_id, priority = ?priority, "priority updated");
        Ok(())
    }
}
