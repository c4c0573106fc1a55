//! Execution units: dedicated OS threads that run one request at a time.
//!
//! Each unit owns a single-threaded tokio runtime and blocks on its inbox
//! between requests. Results travel back to the coordinator as
//! [`UnitEvent`]s; buffers are moved, never copied.
//!
//! Termination is cooperative first (the [`AbortSignal`] is raised and the
//! in-flight future is dropped at its next await point), then the thread is
//! detached. A unit that panics reports [`UnitEvent::Crashed`] and exits.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, warn};

use crate::config::PoolConfig;
use crate::core::error::{GenerationError, SchedulerError};
use crate::core::executor::{AbortSignal, GenerationExecutor, UnitExecutor};
use crate::core::message::{GenerationRequest, UnitEvent, UnitId};

/// Channel on which units report back to the coordinator.
pub type EventSender = mpsc::UnboundedSender<UnitEvent>;

/// Coordinator-side handle to one execution unit.
pub trait ExecutionUnit: Send + 'static {
    /// Unit id.
    fn id(&self) -> UnitId;

    /// Hand a request to the unit. The unit must be idle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Crash`] if the unit is gone.
    fn send(&mut self, request: GenerationRequest) -> Result<(), SchedulerError>;

    /// Stop the unit. Idempotent; in-flight work is abandoned.
    fn terminate(&mut self);
}

/// Creates execution units on demand.
pub trait UnitFactory: Send + 'static {
    /// Unit type produced.
    type Unit: ExecutionUnit;

    /// Create a unit that reports on `events`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Internal`] if the unit cannot be started.
    fn spawn_unit(&mut self, id: UnitId, events: EventSender) -> Result<Self::Unit, SchedulerError>;
}

/// Handle to a unit backed by an OS thread.
#[derive(Debug)]
pub struct ThreadUnit {
    id: UnitId,
    inbox: Option<Sender<GenerationRequest>>,
    abort: AbortSignal,
    kill: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ExecutionUnit for ThreadUnit {
    fn id(&self) -> UnitId {
        self.id
    }

    fn send(&mut self, request: GenerationRequest) -> Result<(), SchedulerError> {
        let Some(inbox) = &self.inbox else {
            return Err(SchedulerError::Crash {
                unit_id: self.id,
                reason: "unit already terminated".into(),
            });
        };
        inbox.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => {
                SchedulerError::Internal(format!("unit {} received work while busy", self.id))
            }
            TrySendError::Disconnected(_) => SchedulerError::Crash {
                unit_id: self.id,
                reason: "unit inbox closed".into(),
            },
        })
    }

    fn terminate(&mut self) {
        if self.inbox.is_none() {
            return;
        }
        self.abort.raise();
        self.kill.notify_one();
        // dropping the sender unblocks an idle unit's recv
        self.inbox = None;
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!(unit_id = self.id, "unit thread panicked before join");
                }
            } else {
                debug!(unit_id = self.id, "detaching unit thread");
            }
        }
    }
}

impl Drop for ThreadUnit {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Spawns [`ThreadUnit`]s running a shared executor.
#[derive(Debug, Clone)]
pub struct ThreadUnitFactory<E = GenerationExecutor> {
    executor: E,
    stack_size: usize,
}

impl<E: UnitExecutor> ThreadUnitFactory<E> {
    /// Factory with an explicit thread stack size.
    pub const fn new(executor: E, stack_size: usize) -> Self {
        Self {
            executor,
            stack_size,
        }
    }

    /// Factory using the stack size from `config`.
    pub const fn from_config(executor: E, config: &PoolConfig) -> Self {
        Self::new(executor, config.thread_stack_size)
    }
}

impl<E: UnitExecutor> UnitFactory for ThreadUnitFactory<E> {
    type Unit = ThreadUnit;

    fn spawn_unit(&mut self, id: UnitId, events: EventSender) -> Result<ThreadUnit, SchedulerError> {
        let (inbox, requests) = bounded(1);
        let abort = AbortSignal::new();
        let kill = Arc::new(Notify::new());

        let worker = UnitWorker {
            id,
            requests,
            events,
            abort: abort.clone(),
            kill: Arc::clone(&kill),
            executor: self.executor.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("seriesgen-unit-{id}"))
            .stack_size(self.stack_size)
            .spawn(move || worker.run())
            .map_err(|e| SchedulerError::Internal(format!("failed to spawn unit {id}: {e}")))?;

        debug!(unit_id = id, "unit spawned");
        Ok(ThreadUnit {
            id,
            inbox: Some(inbox),
            abort,
            kill,
            handle: Some(handle),
        })
    }
}

/// State moved onto the unit thread.
struct UnitWorker<E> {
    id: UnitId,
    requests: Receiver<GenerationRequest>,
    events: EventSender,
    abort: AbortSignal,
    kill: Arc<Notify>,
    executor: E,
}

impl<E: UnitExecutor> UnitWorker<E> {
    fn run(self) {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!(unit_id = self.id, error = %e, "failed to create unit runtime");
                let _ = self.events.send(UnitEvent::Crashed {
                    unit_id: self.id,
                    request_id: None,
                    reason: format!("runtime construction failed: {e}"),
                });
                return;
            }
        };

        while let Ok(request) = self.requests.recv() {
            if self.abort.is_raised() {
                break;
            }
            let request_id = request.request_id;
            debug!(unit_id = self.id, request_id, "unit executing request");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                rt.block_on(async {
                    tokio::select! {
                        biased;
                        () = self.kill.notified() => None,
                        result = self.executor.execute(request, self.abort.clone()) => Some(result),
                    }
                })
            }));

            let event = match outcome {
                Ok(None | Some(Err(GenerationError::Aborted))) if self.abort.is_raised() => break,
                Ok(None) => break,
                Ok(Some(Ok(output))) => UnitEvent::Completed {
                    unit_id: self.id,
                    output,
                },
                Ok(Some(Err(error))) => UnitEvent::Failed {
                    unit_id: self.id,
                    request_id,
                    error,
                },
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    warn!(unit_id = self.id, request_id, %reason, "unit panicked");
                    let _ = self.events.send(UnitEvent::Crashed {
                        unit_id: self.id,
                        request_id: Some(request_id),
                        reason,
                    });
                    break;
                }
            };

            if self.events.send(event).is_err() {
                debug!(unit_id = self.id, "coordinator gone, unit exiting");
                break;
            }
        }

        debug!(unit_id = self.id, "unit thread exiting");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit panicked".to_string()
    }
}
