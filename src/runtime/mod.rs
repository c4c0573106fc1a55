//! Runtime adapters used to launch the coordinator task.

use std::future::Future;

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;

/// Spawns the coordinator future onto some async runtime.
pub trait Spawn {
    /// Spawn a detached task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
