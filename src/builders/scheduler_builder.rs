//! Builder for a [`Scheduler`] backed by thread units.

use crate::config::PoolConfig;
use crate::core::{GenerationExecutor, Scheduler, SchedulerError, ThreadUnitFactory, UnitExecutor};
use crate::runtime::{Spawn, TokioSpawner};
use crate::util::clock::Clock;

/// Assembles a [`Scheduler`] from a [`PoolConfig`] and an executor.
///
/// ```rust,ignore
/// use seriesgen_pool::builders::SchedulerBuilder;
/// use seriesgen_pool::config::PoolConfig;
///
/// let scheduler = SchedulerBuilder::new(PoolConfig::default().with_max_capacity(4)).build()?;
/// let series = scheduler.submit(1_000, 3, "sin", NumericWidth::Float32).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerBuilder<E = GenerationExecutor> {
    config: PoolConfig,
    executor: E,
}

impl SchedulerBuilder<GenerationExecutor> {
    /// Builder running the production generator.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            executor: GenerationExecutor::new(),
        }
    }

    /// Seed the generator from `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock<C: Clock>(mut self, clock: C) -> Self {
        self.executor = GenerationExecutor::with_clock(clock);
        self
    }
}

impl<E: UnitExecutor> SchedulerBuilder<E> {
    /// Replace the executor run by every unit.
    pub fn executor<X: UnitExecutor>(self, executor: X) -> SchedulerBuilder<X> {
        SchedulerBuilder {
            config: self.config,
            executor,
        }
    }

    /// Configuration the scheduler will start with.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Start the scheduler on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails outside a tokio runtime, on invalid configuration, or if the
    /// unit floor cannot be spawned.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        let spawner = TokioSpawner::current()?;
        self.build_on(&spawner)
    }

    /// Start the scheduler with an explicit spawner.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if the unit floor cannot be
    /// spawned.
    pub fn build_on<S: Spawn>(self, spawner: &S) -> Result<Scheduler, SchedulerError> {
        let factory = ThreadUnitFactory::from_config(self.executor, &self.config);
        Scheduler::start(&self.config, factory, spawner)
    }
}
