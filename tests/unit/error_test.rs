//! Tests for error types

use warehouse_dispatch::core::{DispatchError, TaskKind, TaskStatus};
use warehouse_dispatch::util::ids::{TaskId, WorkerId};

#[test]
fn test_error_display() {
    let err = DispatchError::CapacityExceeded {
        required: 2,
        assigned: 2,
    };
    assert_eq!(err.to_string(), "capacity exceeded: 2 of 2 workers already assigned");

    let err = DispatchError::InvalidTransition {
        kind: TaskKind::CycleCount,
        from: TaskStatus::Completed,
        to: TaskStatus::InProgress,
    };
    assert!(err.to_string().contains("COMPLETED -> IN_PROGRESS"));

    let err = DispatchError::IsolationViolation("no tenant context".into());
    assert_eq!(err.to_string(), "isolation violation: no tenant context");
}

#[test]
fn test_not_found_helpers() {
    let id = TaskId::generate();
    let err = DispatchError::task_not_found(id);
    assert!(matches!(err, DispatchError::NotFound { entity: "task", .. }));
    assert!(err.to_string().contains(&id.to_string()));

    let err = DispatchError::worker_not_found(&WorkerId::from("w9"));
    assert_eq!(err.to_string(), "worker not found: w9");
}

#[test]
fn test_error_converts_to_anyhow() {
    fn fails() -> warehouse_dispatch::core::AppResult<()> {
        Err(DispatchError::Backend("connection reset".into()))?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<DispatchError>().is_some());
}
