//! Public scheduler handle and the coordinator task behind it.
//!
//! A single coordinator task owns [`PoolState`] and reacts to four inputs:
//! caller commands, unit events, the nearest request deadline and the idle
//! sweep tick. It never blocks on unit work; callers await only their own
//! reply. Stats are published through a watch channel after every step.

use std::future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::core::error::SchedulerError;
use crate::core::generation::{NumericWidth, SeriesData, SeriesPayload};
use crate::core::message::{GenerationRequest, UnitEvent};
use crate::core::pool_state::{PoolState, PoolStats, Reply};
use crate::core::unit::UnitFactory;
use crate::runtime::Spawn;

enum Command {
    Submit {
        request: GenerationRequest,
        reply: Reply,
    },
    SetCapacity(usize),
    Terminate,
}

/// Handle to a running pool. Cheap to clone; the pool terminates when the
/// last handle is dropped.
#[derive(Debug, Clone)]
pub struct Scheduler {
    commands: mpsc::UnboundedSender<Command>,
    stats: watch::Receiver<PoolStats>,
}

impl Scheduler {
    /// Validate `config`, spawn the unit floor and launch the coordinator.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] for a bad configuration, or the
    /// factory error if the floor cannot be spawned.
    pub fn start<F, S>(config: &PoolConfig, factory: F, spawner: &S) -> Result<Self, SchedulerError>
    where
        F: UnitFactory,
        S: Spawn,
    {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut state = PoolState::new(config, factory, event_tx);
        let origin = Instant::now();
        state.start(0)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (stats_tx, stats_rx) = watch::channel(state.stats());

        let pool_id = Uuid::new_v4();
        let coordinator = Coordinator {
            state,
            commands: command_rx,
            events: event_rx,
            stats: stats_tx,
            origin,
            sweep_interval: config.sweep_interval(),
        };
        spawner.spawn(
            coordinator
                .run()
                .instrument(info_span!("seriesgen_pool", %pool_id)),
        );

        info!(
            %pool_id,
            max_capacity = config.max_capacity,
            min_floor = config.min_floor,
            request_timeout_ms = config.request_timeout_ms,
            "scheduler started"
        );
        Ok(Self {
            commands: command_tx,
            stats: stats_rx,
        })
    }

    /// Generate a series on the pool.
    ///
    /// Resolves once a unit reports back, the request times out, its unit
    /// crashes, or the pool terminates.
    ///
    /// # Errors
    ///
    /// Any [`SchedulerError`] describing why the request was rejected.
    pub async fn submit(
        &self,
        point_count: usize,
        line_count: usize,
        curve_selector: impl Into<String>,
        numeric_width: NumericWidth,
    ) -> Result<SeriesData, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        let request = GenerationRequest::new(0, point_count, line_count, curve_selector, numeric_width);
        self.commands
            .send(Command::Submit { request, reply })
            .map_err(|_| SchedulerError::PoolTerminated)?;

        let output = rx.await.map_err(|_| SchedulerError::PoolTerminated)??;
        let series = match output.payload {
            SeriesPayload::Binary(_) => output.into_series_data(),
            // decoding a large record array would stall this task's runtime
            SeriesPayload::Records(_) => task::spawn_blocking(move || output.into_series_data())
                .await
                .map_err(|e| SchedulerError::Internal(format!("record decode task failed: {e}")))?,
        };
        Ok(series?)
    }

    /// Change the ceiling on units. Takes effect asynchronously.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if `max_capacity` is zero,
    /// [`SchedulerError::PoolTerminated`] after termination.
    pub fn set_capacity(&self, max_capacity: usize) -> Result<(), SchedulerError> {
        if max_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_capacity must be at least 1".into(),
            ));
        }
        self.commands
            .send(Command::SetCapacity(max_capacity))
            .map_err(|_| SchedulerError::PoolTerminated)
    }

    /// Reject all outstanding requests and stop every unit. Idempotent.
    pub fn terminate(&self) {
        let _ = self.commands.send(Command::Terminate);
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        *self.stats.borrow()
    }

    /// Whether the coordinator has stopped.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.commands.is_closed()
    }

    /// Wait until the coordinator has shut down.
    pub async fn wait_terminated(&self) {
        let mut stats = self.stats.clone();
        while stats.changed().await.is_ok() {}
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::PoolTerminated`] if the pool stops first.
    pub async fn wait_for_stats<P>(&self, mut predicate: P) -> Result<PoolStats, SchedulerError>
    where
        P: FnMut(&PoolStats) -> bool,
    {
        let mut stats = self.stats.clone();
        stats
            .wait_for(|s| predicate(s))
            .await
            .map(|s| *s)
            .map_err(|_| SchedulerError::PoolTerminated)
    }
}

struct Coordinator<F: UnitFactory> {
    state: PoolState<F>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<UnitEvent>,
    stats: watch::Sender<PoolStats>,
    origin: Instant,
    sweep_interval: Duration,
}

impl<F: UnitFactory> Coordinator<F> {
    async fn run(mut self) {
        let mut sweep = time::interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self
                .state
                .next_deadline()
                .map(|ms| self.origin + Duration::from_millis(ms));

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        debug!("all scheduler handles dropped");
                        self.state.terminate();
                    }
                },
                Some(event) = self.events.recv() => {
                    let now = self.now_ms();
                    self.state.handle_event(event, now);
                }
                () = deadline_elapsed(deadline) => {
                    let now = self.now_ms();
                    self.state.expire_timeouts(now);
                }
                _ = sweep.tick() => {
                    let now = self.now_ms();
                    let reclaimed = self.state.sweep_idle(now);
                    if reclaimed > 0 {
                        debug!(reclaimed, "idle sweep finished");
                    }
                }
            }

            self.publish();
            if self.state.is_terminated() {
                break;
            }
        }
        info!("coordinator stopped");
    }

    fn apply(&mut self, command: Command) {
        let now = self.now_ms();
        match command {
            Command::Submit { request, reply } => {
                self.state.submit(request, reply, now);
            }
            Command::SetCapacity(max_capacity) => {
                if let Err(err) = self.state.set_capacity(max_capacity, now) {
                    warn!(max_capacity, error = %err, "capacity change rejected");
                }
            }
            Command::Terminate => self.state.terminate(),
        }
    }

    fn publish(&self) {
        let next = self.state.stats();
        self.stats.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}
