//! # seriesgen_pool
//!
//! A scheduler for CPU-bound numeric series generation over a pool of
//! isolated execution units.
//!
//! Generating millions of chart points is pure CPU work. Running it on the
//! async runtime that serves callers would stall everything else, so each
//! request runs on a dedicated OS thread (an *execution unit*) with its own
//! single-threaded tokio runtime, while one coordinator task keeps the
//! bookkeeping non-blocking.
//!
//! ## Key Features
//!
//! - **Lazy growth**: units are spawned on demand up to `max_capacity`
//! - **Warm floor**: at least `min_floor` units are kept alive
//! - **Idle reclamation**: a periodic sweep retires units idle for too long
//! - **FIFO queueing**: requests wait in submission order when all units are busy
//! - **Timeout and crash recovery**: a hung or panicking unit is replaced and
//!   only its own caller sees the error
//! - **Zero-copy handoff**: result buffers are moved back inside a
//!   [`Transfer`](core::Transfer), never cloned
//! - **Deterministic generation**: xorshift32 seeded from the request id and
//!   an injectable clock
//!
//! ## Usage
//!
//! ```rust,ignore
//! use seriesgen_pool::builders::SchedulerBuilder;
//! use seriesgen_pool::config::PoolConfig;
//! use seriesgen_pool::core::NumericWidth;
//!
//! let scheduler = SchedulerBuilder::new(
//!     PoolConfig::default()
//!         .with_max_capacity(4)
//!         .with_request_timeout_ms(5_000),
//! )
//! .build()?;
//!
//! let series = scheduler.submit(100_000, 3, "dampedSine", NumericWidth::Float32).await?;
//! println!("x in [{}, {}]", series.bounds.x_min, series.bounds.x_max);
//!
//! scheduler.terminate();
//! scheduler.wait_terminated().await;
//! ```
//!
//! Custom work can run on the same pool by implementing
//! [`UnitExecutor`](core::UnitExecutor) and passing it to
//! [`SchedulerBuilder::executor`](builders::SchedulerBuilder::executor).

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct a running scheduler from configuration.
pub mod builders;
/// Configuration for the pool: capacity, floor and timings.
pub mod config;
/// Scheduling core: generation, execution units and the coordinator.
pub mod core;
/// Runtime adapters used to launch the coordinator.
pub mod runtime;
/// Clocks and tracing setup.
pub mod util;

pub use crate::builders::SchedulerBuilder;
pub use crate::config::PoolConfig;
pub use crate::core::{NumericWidth, PoolStats, Scheduler, SchedulerError, SeriesData};
