//! Tests for builder modules

use warehouse_dispatch::builders::build_in_memory;
use warehouse_dispatch::config::DispatchConfig;
use warehouse_dispatch::core::DispatchError;

#[test]
fn test_in_memory_builder_uses_config() {
    let cfg = DispatchConfig {
        overload_cap: 3,
        ..DispatchConfig::default()
    };
    let env = build_in_memory(cfg).unwrap();
    assert_eq!(env.dispatcher.config().overload_cap, 3);
    assert_eq!(env.store.task_count_unscoped(), 0);
    assert!(env.movements.lock().records().is_empty());
}

#[test]
fn test_builder_rejects_invalid_config() {
    let cfg = DispatchConfig {
        max_score: 0,
        ..DispatchConfig::default()
    };
    let err = build_in_memory(cfg).err().unwrap();
    assert!(matches!(err, DispatchError::InvalidConfig(_)));
}
