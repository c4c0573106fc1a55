//! Scheduling core: generation, execution units, lifecycle policy and the
//! coordinator.

pub mod error;
pub mod executor;
pub mod generation;
pub mod lifecycle;
pub mod message;
pub mod pool_state;
pub mod scheduler;
pub mod timer;
pub mod unit;

pub use error::{AppResult, GenerationError, SchedulerError};
pub use executor::{AbortSignal, GenerationExecutor, UnitExecutor};
pub use generation::{
    generate, Bounds, Curve, GenerationOutput, NumericBuffer, NumericWidth, SeriesData,
    SeriesPayload, Transfer,
};
pub use lifecycle::{IdleUnit, LifecyclePolicy};
pub use message::{GenerationRequest, RequestId, ResponseHeader, UnitEvent, UnitId};
pub use pool_state::{PoolState, PoolStats, Reply, UnitState};
pub use scheduler::Scheduler;
pub use timer::{DeadlineQueue, TimerToken};
pub use unit::{EventSender, ExecutionUnit, ThreadUnit, ThreadUnitFactory, UnitFactory};
