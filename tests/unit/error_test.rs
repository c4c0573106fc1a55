//! Tests for error types and classification

use seriesgen_pool::core::{GenerationError, SchedulerError};

#[test]
fn test_error_display() {
    let err = SchedulerError::Timeout {
        request_id: 7,
        timeout_ms: 20_000,
    };
    assert_eq!(err.to_string(), "request 7 timed out after 20000 ms");

    let err = SchedulerError::Crash {
        unit_id: 2,
        reason: "stack overflow".into(),
    };
    assert_eq!(err.to_string(), "execution unit 2 crashed: stack overflow");

    assert_eq!(SchedulerError::PoolTerminated.to_string(), "pool terminated");
}

#[test]
fn test_generation_error_display() {
    let err = GenerationError::SizeLimit {
        estimated: 600,
        limit: 512,
    };
    assert_eq!(
        err.to_string(),
        "estimated output of 600 bytes exceeds the 512 byte limit"
    );
}

#[test]
fn test_generation_error_conversion() {
    let validation: SchedulerError = GenerationError::SizeLimit {
        estimated: 2,
        limit: 1,
    }
    .into();
    assert!(matches!(validation, SchedulerError::Validation(_)));

    let aborted: SchedulerError = GenerationError::Aborted.into();
    assert_eq!(
        aborted,
        SchedulerError::Generation("generation aborted".into())
    );
}

#[test]
fn test_only_timeouts_and_crashes_are_infrastructure() {
    let request_errors = [
        SchedulerError::Validation("too big".into()),
        SchedulerError::Generation("bad".into()),
        SchedulerError::InvalidConfig("zero".into()),
        SchedulerError::Internal("spawn".into()),
        SchedulerError::PoolTerminated,
    ];
    assert!(request_errors.iter().all(|e| !e.is_infrastructure()));
}
