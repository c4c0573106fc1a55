//! Configuration models for the scheduler pool.

pub mod pool;

pub use pool::PoolConfig;
