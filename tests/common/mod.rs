//! Shared fixtures for integration tests.

#![allow(dead_code, missing_docs)]

use warehouse_dispatch::builders::{build_in_memory_with, InMemoryDispatch};
use warehouse_dispatch::config::DispatchConfig;
use warehouse_dispatch::core::{
    Dispatcher, LoadingDirection, NewTask, Task, TaskDetail, Tenant, Worker, WorkerRole,
};
use warehouse_dispatch::infra::InMemoryStore;
use warehouse_dispatch::util::ids::{TaskId, TenantId, WorkerId};

pub const WAREHOUSE: &str = "wh-1";

/// In-memory dispatcher whose store yields on every call, with the given
/// tenants registered and floor workers seeded as `(tenant, worker)`.
pub async fn setup(tenants: &[&str], workers: &[(&str, &str)]) -> InMemoryDispatch {
    setup_with(DispatchConfig::default(), tenants, workers).await
}

pub async fn setup_with(
    cfg: DispatchConfig,
    tenants: &[&str],
    workers: &[(&str, &str)],
) -> InMemoryDispatch {
    let env = build_in_memory_with(cfg, InMemoryStore::new().with_io_yield()).unwrap();
    for tenant in tenants {
        env.dispatcher
            .register_tenant(Tenant {
                id: (*tenant).into(),
                name: tenant.to_uppercase(),
            })
            .await
            .unwrap();
    }
    for (tenant, worker) in workers {
        env.store.insert_worker(Worker {
            id: (*worker).into(),
            tenant_id: (*tenant).into(),
            warehouse_id: WAREHOUSE.into(),
            role: WorkerRole::WarehouseWorker,
        });
    }
    env
}

pub fn pick(item: &str, location: &str, quantity: u32) -> NewTask {
    NewTask::new(
        WAREHOUSE,
        TaskDetail::Pick {
            item: item.into(),
            location: location.into(),
            quantity,
        },
    )
}

pub fn put_away() -> NewTask {
    NewTask::new(
        WAREHOUSE,
        TaskDetail::PutAway {
            item: "sku-1".into(),
            to_location: "B-01".into(),
            quantity: 1,
        },
    )
}

pub fn loading(required: u32) -> NewTask {
    NewTask::new(
        WAREHOUSE,
        TaskDetail::Loading {
            shipment: "shp-1".into(),
            direction: LoadingDirection::Loading,
            estimated_minutes: 30,
        },
    )
    .with_required_workers(required)
}

pub fn cycle_count(expected_qty: i64) -> NewTask {
    NewTask::new(
        WAREHOUSE,
        TaskDetail::CycleCount {
            item: "sku-1".into(),
            location: "A-01".into(),
            expected_qty,
            counted_qty: None,
        },
    )
}

pub fn tenant(id: &str) -> TenantId {
    TenantId::from(id)
}

pub fn wid(id: &str) -> WorkerId {
    WorkerId::from(id)
}

/// Give `worker` `count` active put-away tasks. Must run inside a tenant scope.
pub async fn load_worker(dispatcher: &Dispatcher<InMemoryStore>, worker: &str, count: usize) {
    for _ in 0..count {
        let task = dispatcher.create_task(put_away()).await.unwrap();
        dispatcher.assign_worker(task.id, &wid(worker)).await.unwrap();
    }
}

/// Create a task and staff it with `worker`. Must run inside a tenant scope.
pub async fn assigned(dispatcher: &Dispatcher<InMemoryStore>, task: NewTask, worker: &str) -> TaskId {
    let task: Task = dispatcher.create_task(task).await.unwrap();
    dispatcher.assign_worker(task.id, &wid(worker)).await.unwrap();
    task.id
}
