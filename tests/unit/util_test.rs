//! Tests for utility functions

use chrono::{Duration, TimeZone, Utc};
use warehouse_dispatch::util::{day_window, Priority, TaskId, WarehouseId};

#[test]
fn test_priority_ordering() {
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
    assert_eq!(Priority::default(), Priority::Medium);
}

#[test]
fn test_priority_wire_format() {
    assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"HIGH\"");
}

#[test]
fn test_task_ids_are_unique() {
    let a = TaskId::generate();
    let b = TaskId::generate();
    assert_ne!(a, b);
    assert_eq!(TaskId::from_uuid(a.uuid()), a);
}

#[test]
fn test_string_keys() {
    let wh = WarehouseId::new("wh-1");
    assert_eq!(wh.as_str(), "wh-1");
    assert_eq!(wh.to_string(), "wh-1");
    assert_eq!(WarehouseId::from("wh-1"), wh);
}

#[test]
fn test_day_window_spans_one_day() {
    let at = Utc.with_ymd_and_hms(2025, 11, 2, 12, 0, 0).unwrap();
    let (start, end) = day_window(at, 60);
    assert_eq!(end - start, Duration::days(1));
    assert!(start <= at && at < end);
}
