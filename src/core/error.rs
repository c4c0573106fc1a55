//! Error types for generation and scheduler operations.

use thiserror::Error;

use crate::core::message::{RequestId, UnitId};

/// Errors raised inside an execution unit while generating a series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Estimated output exceeds the allocation cap.
    #[error("estimated output of {estimated} bytes exceeds the {limit} byte limit")]
    SizeLimit {
        /// Estimated output size in bytes.
        estimated: u64,
        /// Configured cap in bytes.
        limit: u64,
    },
    /// The unit was terminated while generating.
    #[error("generation aborted")]
    Aborted,
    /// Structured records could not be encoded or decoded.
    #[error("record encoding failed: {0}")]
    Encode(String),
}

/// Errors surfaced to callers of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The request was rejected before generation (e.g. size cap).
    #[error("validation failed: {0}")]
    Validation(String),
    /// No response arrived within the configured window.
    #[error("request {request_id} timed out after {timeout_ms} ms")]
    Timeout {
        /// Request that timed out.
        request_id: RequestId,
        /// Configured timeout.
        timeout_ms: u64,
    },
    /// The unit running the request crashed.
    #[error("execution unit {unit_id} crashed: {reason}")]
    Crash {
        /// Unit that crashed.
        unit_id: UnitId,
        /// Panic message or failure description.
        reason: String,
    },
    /// The pool was terminated before the request resolved.
    #[error("pool terminated")]
    PoolTerminated,
    /// Generation failed for a reason other than validation.
    #[error("generation failed: {0}")]
    Generation(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal failure (thread spawn, missing runtime, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// Whether this error comes from pool infrastructure (timeout or crash)
    /// rather than from the request itself.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Crash { .. })
    }
}

impl From<GenerationError> for SchedulerError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::SizeLimit { .. } => Self::Validation(err.to_string()),
            other => Self::Generation(other.to_string()),
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_maps_to_validation() {
        let err: SchedulerError = GenerationError::SizeLimit {
            estimated: 10,
            limit: 5,
        }
        .into();
        assert!(matches!(err, SchedulerError::Validation(_)));
        assert!(!err.is_infrastructure());
    }

    #[test]
    fn test_other_generation_errors_map_to_generation() {
        let err: SchedulerError = GenerationError::Encode("bad".into()).into();
        assert_eq!(err.to_string(), "generation failed: record encoding failed: bad");
    }

    #[test]
    fn test_infrastructure_classification() {
        assert!(SchedulerError::Timeout {
            request_id: 1,
            timeout_ms: 5
        }
        .is_infrastructure());
        assert!(SchedulerError::Crash {
            unit_id: 3,
            reason: "boom".into()
        }
        .is_infrastructure());
        assert!(!SchedulerError::PoolTerminated.is_infrastructure());
    }
}
