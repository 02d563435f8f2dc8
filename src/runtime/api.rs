//! API-facing request/response models and handlers.
//!
//! Each handler opens a fresh tenant unit of work for the request's tenant and
//! tears it down when the handler returns; nothing tenant-scoped outlives the
//! call.

use serde::{Deserialize, Serialize};

use crate::core::{
    AssignOutcome, DispatchError, Dispatcher, NewTask, RankedWorker, Task, TaskStatus,
    TaskStore, TenantRegistry, TransitionOutcome, WorkerDirectory, WorkerRole, WorkloadSnapshot,
};
use crate::util::ids::{TaskId, TenantId, WarehouseId, WorkerId};

/// Error payload returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let code = match &err {
            DispatchError::IsolationViolation(_) => "isolation_violation",
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::InvalidTransition { .. } => "invalid_transition",
            DispatchError::CapacityExceeded { .. } => "capacity_exceeded",
            DispatchError::ConcurrentModification { .. } | DispatchError::VersionConflict { .. } => {
                "concurrent_modification"
            }
            DispatchError::NotAssigned { .. } => "not_assigned",
            DispatchError::InvalidConfig(_) => "invalid_config",
            DispatchError::Backend(_) => "backend",
        };
        Self {
            code: code.into(),
            message: err.to_string(),
        }
    }
}

/// Task creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Acting tenant.
    pub tenant_id: TenantId,
    /// Task to create; any tenant on it is ignored.
    pub task: NewTask,
    /// Run auto-assignment right after creation.
    #[serde(default)]
    pub auto_assign: bool,
}

/// Task creation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    /// Task after creation (and staffing, if requested).
    pub task: Task,
    /// Staffing result.
    pub assignment: Option<AssignOutcome>,
}

/// Staffing payload; without `worker_id` the engine picks workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    /// Acting tenant.
    pub tenant_id: TenantId,
    /// Task to staff.
    pub task_id: TaskId,
    /// Worker to assign manually.
    pub worker_id: Option<WorkerId>,
}

/// Unassignment payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnassignRequest {
    /// Acting tenant.
    pub tenant_id: TenantId,
    /// Task to release.
    pub task_id: TaskId,
    /// Worker to remove.
    pub worker_id: WorkerId,
}

/// Status change payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Acting tenant.
    pub tenant_id: TenantId,
    /// Task to move.
    pub task_id: TaskId,
    /// Requested status.
    pub status: TaskStatus,
}

/// Worker-facing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkerAction {
    /// Begin or resume.
    Start,
    /// Suspend.
    Pause,
    /// Finish.
    Complete,
    /// Report a cycle-count result.
    RecordCount {
        /// Units counted.
        counted_qty: i64,
    },
}

/// Worker action payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerActionRequest {
    /// Acting tenant.
    pub tenant_id: TenantId,
    /// Task acted on.
    pub task_id: TaskId,
    /// Acting worker.
    pub worker_id: WorkerId,
    /// What the worker did.
    #[serde(flatten)]
    pub action: WorkerAction,
}

/// Status change response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Status after the call.
    pub status: TaskStatus,
    /// False when the request repeated a terminal status.
    pub applied: bool,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        let applied = outcome.is_applied();
        let task = outcome.task();
        Self {
            task_id: task.id,
            status: task.status,
            applied,
        }
    }
}

/// Workload lookup payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadRequest {
    /// Acting tenant.
    pub tenant_id: TenantId,
    /// Worker to measure.
    pub worker_id: WorkerId,
}

/// Candidate listing payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableWorkersRequest {
    /// Acting tenant.
    pub tenant_id: TenantId,
    /// Warehouse to search.
    pub warehouse_id: WarehouseId,
    /// Role filter; defaults to the configured assignable role.
    pub role: Option<WorkerRole>,
    /// Overload cap; defaults to the configured cap.
    pub overload_cap: Option<u32>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Crate version.
    pub version: String,
}

/// Create a task, optionally staffing it.
pub async fn create_task<B>(
    dispatcher: &Dispatcher<B>,
    req: CreateTaskRequest,
) -> Result<CreateTaskResponse, ApiError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    let CreateTaskRequest {
        tenant_id,
        task,
        auto_assign,
    } = req;
    dispatcher
        .within(&tenant_id, async move {
            let task = dispatcher.create_task(task).await?;
            if !auto_assign {
                return Ok(CreateTaskResponse {
                    task,
                    assignment: None,
                });
            }
            let assignment = dispatcher.auto_assign(task.id).await?;
            let task = dispatcher.task(task.id).await?;
            Ok(CreateTaskResponse {
                task,
                assignment: Some(assignment),
            })
        })
        .await
        .map_err(ApiError::from)
}

/// Staff a task automatically or with a named worker.
pub async fn assign<B>(dispatcher: &Dispatcher<B>, req: AssignRequest) -> Result<AssignOutcome, ApiError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    dispatcher
        .within(&req.tenant_id, async {
            match &req.worker_id {
                Some(worker_id) => dispatcher.assign_worker(req.task_id, worker_id).await,
                None => dispatcher.auto_assign(req.task_id).await,
            }
        })
        .await
        .map_err(ApiError::from)
}

/// Remove a worker from a task.
pub async fn unassign<B>(
    dispatcher: &Dispatcher<B>,
    req: UnassignRequest,
) -> Result<AssignOutcome, ApiError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    dispatcher
        .within(&req.tenant_id, dispatcher.unassign(req.task_id, &req.worker_id))
        .await
        .map_err(ApiError::from)
}

/// Apply a status change.
pub async fn transition<B>(
    dispatcher: &Dispatcher<B>,
    req: TransitionRequest,
) -> Result<TransitionResponse, ApiError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    dispatcher
        .within(&req.tenant_id, dispatcher.transition(req.task_id, req.status))
        .await
        .map(TransitionResponse::from)
        .map_err(ApiError::from)
}

/// Apply a worker-facing action.
pub async fn worker_action<B>(
    dispatcher: &Dispatcher<B>,
    req: WorkerActionRequest,
) -> Result<TransitionResponse, ApiError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    let task_id = req.task_id;
    let worker_id = &req.worker_id;
    dispatcher
        .within(&req.tenant_id, async {
            match req.action {
                WorkerAction::Start => dispatcher.start(task_id, worker_id).await,
                WorkerAction::Pause => dispatcher.pause(task_id, worker_id).await,
                WorkerAction::Complete => dispatcher.complete(task_id, worker_id).await,
                WorkerAction::RecordCount { counted_qty } => {
                    dispatcher.record_count(task_id, worker_id, counted_qty).await
                }
            }
        })
        .await
        .map(TransitionResponse::from)
        .map_err(ApiError::from)
}

/// Current load of a worker.
pub async fn workload<B>(
    dispatcher: &Dispatcher<B>,
    req: WorkloadRequest,
) -> Result<WorkloadSnapshot, ApiError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    dispatcher
        .within(&req.tenant_id, dispatcher.compute_workload(&req.worker_id))
        .await
        .map_err(ApiError::from)
}

/// Ranked candidates in a warehouse.
pub async fn available_workers<B>(
    dispatcher: &Dispatcher<B>,
    req: AvailableWorkersRequest,
) -> Result<Vec<RankedWorker>, ApiError>
where
    B: TaskStore + WorkerDirectory + TenantRegistry,
{
    dispatcher
        .within(
            &req.tenant_id,
            dispatcher.list_available_workers(&req.warehouse_id, req.role, req.overload_cap),
        )
        .await
        .map_err(ApiError::from)
}

/// Return a health payload.
pub fn health() -> Health {
    Health {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
