//! Tests for configuration validation

use std::collections::HashMap;

use warehouse_dispatch::config::{DispatchConfig, MAX_LOG_CAPACITY};
use warehouse_dispatch::core::WorkerRole;

#[test]
fn test_default_config_is_valid() {
    let cfg = DispatchConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.overload_cap, 8);
    assert_eq!(cfg.max_score, 100);
}

#[test]
fn test_zero_overload_cap_is_invalid() {
    let invalid = DispatchConfig {
        overload_cap: 0,
        ..DispatchConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_zero_retries_is_invalid() {
    let invalid = DispatchConfig {
        max_commit_retries: 0,
        ..DispatchConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_out_of_range_offset_is_invalid() {
    let invalid = DispatchConfig {
        utc_offset_minutes: 15 * 60,
        ..DispatchConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_oversized_log_capacity_is_invalid() {
    let at_limit = DispatchConfig {
        movement_log_capacity: MAX_LOG_CAPACITY,
        ..DispatchConfig::default()
    };
    assert!(at_limit.validate().is_ok());

    let err = DispatchConfig::from_json_str(r#"{"movement_log_capacity": 18446744073709551615}"#)
        .unwrap_err();
    assert!(err.contains("movement_log_capacity"));
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "overload_cap": 5,
        "utc_offset_minutes": -300,
        "worker_role": "supervisor"
    }"#;

    let cfg = DispatchConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.overload_cap, 5);
    assert_eq!(cfg.utc_offset_minutes, -300);
    assert_eq!(cfg.worker_role, WorkerRole::Supervisor);
    assert_eq!(cfg.score_decay, 10);
}

#[test]
fn test_config_from_json_rejects_invalid_values() {
    assert!(DispatchConfig::from_json_str(r#"{ "max_score": 0 }"#).is_err());
    assert!(DispatchConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_variables() {
    let vars: HashMap<&str, &str> = [
        ("DISPATCH_OVERLOAD_CAP", "12"),
        ("DISPATCH_COMMIT_RETRIES", " 3 "),
        ("DISPATCH_WORKER_ROLE", "Admin"),
    ]
    .into_iter()
    .collect();

    let cfg = DispatchConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_string())).unwrap();
    assert_eq!(cfg.overload_cap, 12);
    assert_eq!(cfg.max_commit_retries, 3);
    assert_eq!(cfg.worker_role, WorkerRole::Admin);
    assert_eq!(cfg.max_score, 100);
}

#[test]
fn test_config_from_variables_reports_bad_values() {
    let err = DispatchConfig::from_lookup(|name| {
        (name == "DISPATCH_OVERLOAD_CAP").then(|| "lots".to_string())
    })
    .unwrap_err();
    assert!(err.contains("DISPATCH_OVERLOAD_CAP"));
}

#[test]
fn test_availability_score_curve() {
    let cfg = DispatchConfig::default();
    assert_eq!(cfg.availability_score(0), 100);
    assert_eq!(cfg.availability_score(3), 70);
    assert_eq!(cfg.availability_score(10), 0);
    assert_eq!(cfg.availability_score(u64::MAX), 0);
}
