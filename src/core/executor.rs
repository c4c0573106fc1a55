//! Executor abstraction run inside each execution unit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::GenerationError;
use crate::core::generation::{generate, seed_for, GenerationOutput};
use crate::core::message::GenerationRequest;
use crate::util::clock::{Clock, SystemClock};

/// Cooperative termination flag shared between a unit handle and its thread.
///
/// Raised when the coordinator terminates the unit; long-running executors
/// poll it and bail out with [`GenerationError::Aborted`].
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// A signal that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the signal has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Executes one request inside an execution unit.
///
/// Called from the unit's dedicated OS thread, inside that thread's own
/// single-threaded tokio runtime, so CPU-bound work never blocks the
/// coordinator. Results do not need to be serializable; buffers are moved
/// back to the coordinator.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use seriesgen_pool::core::{AbortSignal, GenerationError, GenerationOutput, GenerationRequest, UnitExecutor};
///
/// #[derive(Clone)]
/// struct Refusing;
///
/// #[async_trait]
/// impl UnitExecutor for Refusing {
///     async fn execute(
///         &self,
///         _request: GenerationRequest,
///         _abort: AbortSignal,
///     ) -> Result<GenerationOutput, GenerationError> {
///         Err(GenerationError::Encode("not today".into()))
///     }
/// }
/// ```
#[async_trait]
pub trait UnitExecutor: Send + Sync + Clone + 'static {
    /// Run the request to completion, or until `abort` is raised.
    async fn execute(
        &self,
        request: GenerationRequest,
        abort: AbortSignal,
    ) -> Result<GenerationOutput, GenerationError>;
}

/// Production executor: seeds xorshift32 from the request id and the clock,
/// then runs [`generate`].
#[derive(Clone)]
pub struct GenerationExecutor {
    clock: Arc<dyn Clock>,
}

impl GenerationExecutor {
    /// Executor seeded from the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Executor seeded from a custom clock. Freezing the clock makes output
    /// reproducible for a given request id.
    #[must_use]
    pub fn with_clock<C: Clock>(clock: C) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }
}

impl Default for GenerationExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GenerationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl UnitExecutor for GenerationExecutor {
    async fn execute(
        &self,
        request: GenerationRequest,
        abort: AbortSignal,
    ) -> Result<GenerationOutput, GenerationError> {
        let seed = seed_for(request.request_id, self.clock.now_ms());
        generate(&request, seed, &abort)
    }
}
