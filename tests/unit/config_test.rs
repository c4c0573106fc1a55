//! Tests for configuration validation and loading

use seriesgen_pool::config::PoolConfig;

#[test]
fn test_builder_setters() {
    let cfg = PoolConfig::new()
        .with_max_capacity(8)
        .with_min_floor(2)
        .with_request_timeout_ms(1_500)
        .with_idle_threshold_ms(4_000)
        .with_sweep_interval_ms(250)
        .with_thread_stack_size(512 * 1024);

    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_capacity, 8);
    assert_eq!(cfg.min_floor, 2);
    assert_eq!(cfg.sweep_interval().as_millis(), 250);
}

#[test]
fn test_zero_capacity_is_invalid() {
    let cfg = PoolConfig::new().with_max_capacity(0).with_min_floor(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_floor_above_capacity_is_invalid() {
    let err = PoolConfig::new()
        .with_max_capacity(2)
        .with_min_floor(3)
        .validate()
        .unwrap_err();
    assert!(err.contains("min_floor"));
}

#[test]
fn test_zero_floor_is_valid() {
    assert!(PoolConfig::new().with_min_floor(0).validate().is_ok());
}

#[test]
fn test_zero_timings_are_invalid() {
    assert!(PoolConfig::new().with_request_timeout_ms(0).validate().is_err());
    assert!(PoolConfig::new().with_idle_threshold_ms(0).validate().is_err());
    assert!(PoolConfig::new().with_sweep_interval_ms(0).validate().is_err());
}

#[test]
fn test_tiny_stack_is_invalid() {
    assert!(PoolConfig::new().with_thread_stack_size(4096).validate().is_err());
}

#[test]
fn test_from_json_fills_defaults() {
    let cfg = PoolConfig::from_json_str(r#"{"max_capacity": 3, "request_timeout_ms": 900}"#).unwrap();
    assert_eq!(cfg.max_capacity, 3);
    assert_eq!(cfg.request_timeout_ms, 900);
    assert_eq!(cfg.min_floor, PoolConfig::default().min_floor);
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(PoolConfig::from_json_str(r#"{"max_capacity": 0}"#).is_err());
    assert!(PoolConfig::from_json_str("not json").is_err());
}
