//! API surface: request/response models and per-request handlers.

pub mod api;

pub use api::{
    assign, available_workers, create_task, health, transition, unassign, worker_action,
    workload, ApiError, AssignRequest, AvailableWorkersRequest, CreateTaskRequest,
    CreateTaskResponse, Health, TransitionRequest, TransitionResponse, UnassignRequest,
    WorkerAction, WorkerActionRequest, WorkloadRequest,
};
