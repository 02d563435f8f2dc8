//! Tenant isolation, workload balancing, assignment, and task lifecycle.

pub mod assignment;
pub mod audit;
pub mod dispatcher;
pub mod error;
pub mod inventory;
pub mod isolation;
pub mod lifecycle;
pub mod loading;
pub mod store;
pub mod task;
pub mod tenant;
pub mod workload;

pub use assignment::{AssignOutcome, AssignmentEngine};
pub use audit::{
    build_movement_record, InMemoryMovementSink, MovementAction, MovementRecord, MovementSink,
    PostgresMovementSink, SharedMovementSink,
};
pub use dispatcher::{Dispatcher, LoadingTaskOutcome, TaskStats};
pub use error::{AppResult, DispatchError};
pub use inventory::{AdjustmentReason, InventoryAdjustment, InventoryLedger};
pub use isolation::{AdminGrant, Isolated};
pub use lifecycle::{is_legal_transition, TaskLifecycle, TransitionOutcome};
pub use loading::{LoadingPlan, ShipmentProfile};
pub use store::{
    AssignmentFilter, AssignmentOp, CommitReceipt, TaskCommit, TaskFilter, TaskPatch, TaskStore,
    TenantRegistry, WorkerDirectory, WorkerFilter,
};
pub use task::{
    Assignment, AssignmentStatus, LoadingDirection, NewTask, Task, TaskDetail, TaskKind,
    TaskStatus, Tenant, Worker, WorkerRole,
};
pub use tenant::{scope, TenantContext};
pub use workload::{RankedWorker, WorkloadAggregator, WorkloadSnapshot};
