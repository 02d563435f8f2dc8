//! Tests for API handlers

use warehouse_dispatch::builders::build_in_memory;
use warehouse_dispatch::config::DispatchConfig;
use warehouse_dispatch::core::{NewTask, TaskDetail, TaskStatus, Tenant, Worker, WorkerRole};
use warehouse_dispatch::runtime::api::{
    self, AssignRequest, CreateTaskRequest, TransitionRequest, WorkerAction, WorkerActionRequest,
    WorkloadRequest,
};

#[tokio::test]
async fn test_handlers_round_trip() {
    let env = build_in_memory(DispatchConfig::default()).unwrap();
    env.dispatcher
        .register_tenant(Tenant {
            id: "acme".into(),
            name: "Acme".into(),
        })
        .await
        .unwrap();
    env.store.insert_worker(Worker {
        id: "w1".into(),
        tenant_id: "acme".into(),
        warehouse_id: "wh-1".into(),
        role: WorkerRole::WarehouseWorker,
    });

    let created = api::create_task(
        &env.dispatcher,
        CreateTaskRequest {
            tenant_id: "acme".into(),
            task: NewTask::new(
                "wh-1",
                TaskDetail::PutAway {
                    item: "sku-1".into(),
                    to_location: "B-01".into(),
                    quantity: 4,
                },
            ),
            auto_assign: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(created.task.status, TaskStatus::Assigned);
    let task_id = created.task.id;

    let started = api::worker_action(
        &env.dispatcher,
        WorkerActionRequest {
            tenant_id: "acme".into(),
            task_id,
            worker_id: "w1".into(),
            action: WorkerAction::Start,
        },
    )
    .await
    .unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);

    let load = api::workload(
        &env.dispatcher,
        WorkloadRequest {
            tenant_id: "acme".into(),
            worker_id: "w1".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(load.put_away_tasks, 1);

    let err = api::transition(
        &env.dispatcher,
        TransitionRequest {
            tenant_id: "acme".into(),
            task_id,
            status: TaskStatus::Pending,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, "invalid_transition");
}

#[tokio::test]
async fn test_unknown_tenant_maps_to_not_found() {
    let env = build_in_memory(DispatchConfig::default()).unwrap();
    let err = api::assign(
        &env.dispatcher,
        AssignRequest {
            tenant_id: "ghost".into(),
            task_id: warehouse_dispatch::util::ids::TaskId::generate(),
            worker_id: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, "not_found");
}

#[test]
fn test_worker_action_wire_format() {
    let json = r#"{
        "tenant_id": "acme",
        "task_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "worker_id": "w1",
        "action": "record_count",
        "counted_qty": 7
    }"#;
    let req: WorkerActionRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.action, WorkerAction::RecordCount { counted_qty: 7 });
}

#[test]
fn test_health() {
    let health = api::health();
    assert!(health.ok);
    assert!(!health.version.is_empty());
}
