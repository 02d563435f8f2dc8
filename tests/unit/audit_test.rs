//! Tests for the movement log

use warehouse_dispatch::core::{
    build_movement_record, InMemoryMovementSink, LoadingDirection, MovementAction, MovementSink,
    NewTask, TaskDetail, TaskStatus,
};
use warehouse_dispatch::util::ids::{LocationRef, ShipmentRef, TenantId};

fn cross_dock() -> warehouse_dispatch::core::Task {
    NewTask::new(
        "wh-1",
        TaskDetail::CrossDock {
            item: "sku-9".into(),
            inbound_dock: "IN-1".into(),
            outbound_dock: "OUT-3".into(),
            quantity: 24,
        },
    )
    .into_task("acme".into(), warehouse_dispatch::util::now())
}

#[test]
fn test_in_memory_movement_sink() {
    let mut sink = InMemoryMovementSink::new(10);
    let task = cross_dock();

    sink.record(build_movement_record(&task, TaskStatus::Completed, None));
    assert_eq!(sink.records().len(), 1);

    let records = sink.records();
    assert_eq!(records[0].task_id, task.id);
    assert_eq!(records[0].action, MovementAction::CrossDock);
    assert_eq!(records[0].from_location, Some(LocationRef::from("IN-1")));
    assert_eq!(records[0].to_location, Some(LocationRef::from("OUT-3")));
    assert_eq!(records[0].quantity, 24);
}

#[test]
fn test_movement_sink_overflow() {
    let mut sink = InMemoryMovementSink::new(2);
    let tasks: Vec<_> = (0..3).map(|_| cross_dock()).collect();
    for task in &tasks {
        sink.record(build_movement_record(task, TaskStatus::Completed, None));
    }

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].task_id, tasks[1].id); // oldest dropped
    assert_eq!(records[1].task_id, tasks[2].id);
}

#[test]
fn test_huge_sink_allocates_on_demand() {
    let mut sink = InMemoryMovementSink::new(usize::MAX);
    let task = cross_dock();
    sink.record(build_movement_record(&task, TaskStatus::Completed, None));
    assert_eq!(sink.records().len(), 1);
}

#[test]
fn test_loading_record_carries_shipment() {
    let task = NewTask::new(
        "wh-1",
        TaskDetail::Loading {
            shipment: "shp-7".into(),
            direction: LoadingDirection::Unloading,
            estimated_minutes: 45,
        },
    )
    .into_task("acme".into(), warehouse_dispatch::util::now());

    let record = build_movement_record(&task, TaskStatus::Completed, Some("dock 4".to_string()));
    assert_eq!(record.action, MovementAction::Unload);
    assert_eq!(record.shipment, Some(ShipmentRef::from("shp-7")));
    assert_eq!(record.tenant_id, TenantId::from("acme"));
    assert_eq!(record.note.as_deref(), Some("dock 4"));
}
