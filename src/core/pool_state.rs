//! Coordinator-owned scheduling state.
//!
//! `PoolState` holds every registry of the pool (units, wait queue, pending
//! requests, deadlines) and is only ever touched by the coordinator task.
//! All transitions take `now_ms` explicitly, so timeout and reclamation
//! logic runs in tests without waiting on a clock.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::core::error::SchedulerError;
use crate::core::generation::GenerationOutput;
use crate::core::lifecycle::{IdleUnit, LifecyclePolicy};
use crate::core::message::{GenerationRequest, RequestId, UnitEvent, UnitId};
use crate::core::timer::{DeadlineQueue, TimerToken};
use crate::core::unit::{EventSender, ExecutionUnit, UnitFactory};

/// Consecutive failed dispatches tolerated for one request before it is
/// rejected.
const MAX_DISPATCH_ATTEMPTS: usize = 3;

/// Where a caller's result is delivered.
pub type Reply = oneshot::Sender<Result<GenerationOutput, SchedulerError>>;

/// Lifecycle state of an execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Waiting for work.
    Idle,
    /// Running exactly one request.
    Active,
    /// Stopped; never reused.
    Terminated,
}

struct UnitSlot<U> {
    unit: U,
    state: UnitState,
    current_request: Option<RequestId>,
    last_activity_ms: u64,
}

struct PendingEntry {
    reply: Reply,
    unit_id: UnitId,
    timer: TimerToken,
    dispatched_at_ms: u64,
}

struct QueuedRequest {
    request: GenerationRequest,
    reply: Reply,
    attempts: usize,
}

/// Snapshot of pool occupancy and lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Current ceiling on units.
    pub max_capacity: usize,
    /// Live units.
    pub total_units: usize,
    /// Units running a request.
    pub active_units: usize,
    /// Units waiting for work.
    pub idle_units: usize,
    /// Requests waiting for a unit.
    pub queue_length: usize,
    /// Requests dispatched and not yet resolved.
    pub pending_count: usize,
    /// Requests accepted since start.
    pub submitted: u64,
    /// Requests resolved successfully.
    pub completed: u64,
    /// Requests rejected with a generation or crash error.
    pub failed: u64,
    /// Requests rejected with a timeout.
    pub timed_out: u64,
    /// Units lost to panics or dead channels.
    pub crashed_units: u64,
    /// Units spawned since start.
    pub spawned_units: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: u64,
    completed: u64,
    failed: u64,
    timed_out: u64,
    crashed_units: u64,
    spawned_units: u64,
}

/// Scheduling state machine driven by the coordinator.
pub struct PoolState<F: UnitFactory> {
    factory: F,
    events: EventSender,
    policy: LifecyclePolicy,
    request_timeout_ms: u64,
    units: BTreeMap<UnitId, UnitSlot<F::Unit>>,
    queue: VecDeque<QueuedRequest>,
    pending: HashMap<RequestId, PendingEntry>,
    deadlines: DeadlineQueue<RequestId>,
    next_request_id: RequestId,
    next_unit_id: UnitId,
    counters: Counters,
    terminated: bool,
}

impl<F: UnitFactory> PoolState<F> {
    /// Empty state. Call [`start`](Self::start) to bring up the floor.
    pub fn new(config: &PoolConfig, factory: F, events: EventSender) -> Self {
        Self {
            factory,
            events,
            policy: LifecyclePolicy::from_config(config),
            request_timeout_ms: config.request_timeout_ms,
            units: BTreeMap::new(),
            queue: VecDeque::new(),
            pending: HashMap::new(),
            deadlines: DeadlineQueue::new(),
            next_request_id: 1,
            next_unit_id: 1,
            counters: Counters::default(),
            terminated: false,
        }
    }

    /// Spawn units up to the floor.
    ///
    /// # Errors
    ///
    /// Returns the factory error if a unit cannot be spawned.
    pub fn start(&mut self, now_ms: u64) -> Result<(), SchedulerError> {
        self.ensure_floor(now_ms)?;
        info!(
            max_capacity = self.policy.max_capacity,
            min_floor = self.policy.min_floor,
            "pool started"
        );
        Ok(())
    }

    /// Accept a request, assign it the next id and try to dispatch it.
    ///
    /// Any id already on `request` is overwritten. Returns `None` if the
    /// pool is terminated, in which case `reply` has been rejected.
    pub fn submit(
        &mut self,
        mut request: GenerationRequest,
        reply: Reply,
        now_ms: u64,
    ) -> Option<RequestId> {
        if self.terminated {
            let _ = reply.send(Err(SchedulerError::PoolTerminated));
            return None;
        }
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        request.request_id = request_id;
        self.counters.submitted += 1;

        debug!(
            request_id,
            point_count = request.point_count,
            line_count = request.line_count,
            curve = %request.curve_selector,
            "request accepted"
        );
        self.queue.push_back(QueuedRequest {
            request,
            reply,
            attempts: 0,
        });
        self.drain(now_ms);
        Some(request_id)
    }

    /// Apply an event reported by a unit.
    pub fn handle_event(&mut self, event: UnitEvent, now_ms: u64) {
        if let Some(slot) = self.units.get_mut(&event.unit_id()) {
            slot.last_activity_ms = now_ms;
        }
        match event {
            UnitEvent::Completed { unit_id, output } => {
                let request_id = output.request_id;
                self.finish(unit_id, request_id, Ok(output));
            }
            UnitEvent::Failed {
                unit_id,
                request_id,
                error,
            } => self.finish(unit_id, request_id, Err(error.into())),
            UnitEvent::Crashed {
                unit_id,
                request_id,
                reason,
            } => self.on_crash(unit_id, request_id, reason, now_ms),
        }
        self.drain(now_ms);
    }

    /// Reject every request whose deadline is at or before `now_ms` and
    /// replace the units that were running them. Returns the number of
    /// requests timed out.
    pub fn expire_timeouts(&mut self, now_ms: u64) -> usize {
        let mut expired = 0;
        for request_id in self.deadlines.pop_expired(now_ms) {
            let Some(entry) = self.pending.remove(&request_id) else {
                continue;
            };
            warn!(
                request_id,
                unit_id = entry.unit_id,
                elapsed_ms = now_ms.saturating_sub(entry.dispatched_at_ms),
                "request timed out, terminating unit"
            );
            let _ = entry.reply.send(Err(SchedulerError::Timeout {
                request_id,
                timeout_ms: self.request_timeout_ms,
            }));
            self.counters.timed_out += 1;
            self.remove_unit(entry.unit_id);
            expired += 1;
        }
        if expired > 0 {
            self.restore_floor(now_ms);
            self.drain(now_ms);
        }
        expired
    }

    /// Earliest pending deadline, in milliseconds.
    pub fn next_deadline(&mut self) -> Option<u64> {
        self.deadlines.next_deadline()
    }

    /// Terminate idle units past the idle threshold, or above the ceiling,
    /// while the pool stays above its floor, and respawn any floor units
    /// lost earlier. Returns the number reclaimed.
    pub fn sweep_idle(&mut self, now_ms: u64) -> usize {
        let idle = self.idle_units();
        let picked = self
            .policy
            .select_reclaimable(&idle, self.units.len(), now_ms);
        for unit_id in &picked {
            info!(unit_id = *unit_id, "reclaiming idle unit");
            self.remove_unit(*unit_id);
        }
        self.restore_floor(now_ms);
        picked.len()
    }

    /// Change the ceiling on units.
    ///
    /// Shrinking retires idle units immediately and busy ones once they
    /// report back. Growing dispatches queued work.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if `max_capacity` is zero,
    /// [`SchedulerError::PoolTerminated`] after termination.
    pub fn set_capacity(&mut self, max_capacity: usize, now_ms: u64) -> Result<(), SchedulerError> {
        if self.terminated {
            return Err(SchedulerError::PoolTerminated);
        }
        if max_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_capacity must be at least 1".into(),
            ));
        }
        let previous = self.policy.max_capacity;
        self.policy.resize(max_capacity);
        info!(previous, max_capacity, "pool capacity changed");

        let idle = self.idle_units();
        for unit_id in self.policy.select_surplus(&idle, self.units.len()) {
            debug!(unit_id, "retiring surplus unit");
            self.remove_unit(unit_id);
        }
        self.restore_floor(now_ms);
        self.drain(now_ms);
        Ok(())
    }

    /// Reject all queued and pending requests, cancel deadlines and destroy
    /// every unit. Idempotent.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        info!(
            queued = self.queue.len(),
            pending = self.pending.len(),
            units = self.units.len(),
            "terminating pool"
        );
        for queued in self.queue.drain(..) {
            let _ = queued.reply.send(Err(SchedulerError::PoolTerminated));
        }
        for (_, entry) in self.pending.drain() {
            let _ = entry.reply.send(Err(SchedulerError::PoolTerminated));
        }
        self.deadlines.clear();
        for slot in self.units.values_mut() {
            slot.unit.terminate();
            slot.state = UnitState::Terminated;
        }
        self.units.clear();
    }

    /// Whether [`terminate`](Self::terminate) has run.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Current snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let active_units = self
            .units
            .values()
            .filter(|s| s.state == UnitState::Active)
            .count();
        PoolStats {
            max_capacity: self.policy.max_capacity,
            total_units: self.units.len(),
            active_units,
            idle_units: self.units.len() - active_units,
            queue_length: self.queue.len(),
            pending_count: self.pending.len(),
            submitted: self.counters.submitted,
            completed: self.counters.completed,
            failed: self.counters.failed,
            timed_out: self.counters.timed_out,
            crashed_units: self.counters.crashed_units,
            spawned_units: self.counters.spawned_units,
        }
    }

    /// Dispatch queued requests, then top the pool back up to its floor,
    /// since failed dispatches remove units without replacing them.
    fn drain(&mut self, now_ms: u64) {
        self.dispatch_queued(now_ms);
        self.restore_floor(now_ms);
    }

    /// Dispatch queued requests to idle units, spawning while under the
    /// ceiling.
    fn dispatch_queued(&mut self, now_ms: u64) {
        while !self.terminated && !self.queue.is_empty() {
            let unit_id = match self.first_idle() {
                Some(unit_id) => unit_id,
                None if self.policy.can_spawn(self.units.len()) => match self.spawn(now_ms) {
                    Ok(unit_id) => unit_id,
                    Err(err) => {
                        error!(error = %err, "failed to spawn unit");
                        if self.units.is_empty() {
                            // nothing will ever pick these up
                            for queued in self.queue.drain(..) {
                                self.counters.failed += 1;
                                let _ = queued.reply.send(Err(err.clone()));
                            }
                        }
                        return;
                    }
                },
                None => return,
            };
            let Some(queued) = self.queue.pop_front() else {
                return;
            };
            if let Err((mut queued, err)) = self.dispatch(unit_id, queued, now_ms) {
                queued.attempts += 1;
                if queued.attempts >= MAX_DISPATCH_ATTEMPTS {
                    warn!(
                        request_id = queued.request.request_id,
                        attempts = queued.attempts,
                        "giving up on request after repeated dispatch failures"
                    );
                    self.counters.failed += 1;
                    let _ = queued.reply.send(Err(err));
                } else {
                    self.queue.push_front(queued);
                }
            }
        }
    }

    fn dispatch(
        &mut self,
        unit_id: UnitId,
        queued: QueuedRequest,
        now_ms: u64,
    ) -> Result<(), (QueuedRequest, SchedulerError)> {
        let request_id = queued.request.request_id;
        let Some(slot) = self.units.get_mut(&unit_id) else {
            let err = SchedulerError::Internal(format!("unit {unit_id} vanished before dispatch"));
            return Err((queued, err));
        };
        if let Err(err) = slot.unit.send(queued.request.clone()) {
            warn!(unit_id, request_id, error = %err, "dispatch failed, replacing unit");
            self.counters.crashed_units += 1;
            self.remove_unit(unit_id);
            return Err((queued, err));
        }
        slot.state = UnitState::Active;
        slot.current_request = Some(request_id);
        slot.last_activity_ms = now_ms;

        let timer = self
            .deadlines
            .schedule(now_ms.saturating_add(self.request_timeout_ms), request_id);
        self.pending.insert(
            request_id,
            PendingEntry {
                reply: queued.reply,
                unit_id,
                timer,
                dispatched_at_ms: now_ms,
            },
        );
        debug!(unit_id, request_id, "request dispatched");
        Ok(())
    }

    fn finish(
        &mut self,
        unit_id: UnitId,
        request_id: RequestId,
        result: Result<GenerationOutput, SchedulerError>,
    ) {
        match self.take_pending(request_id, unit_id) {
            Some(entry) => {
                if result.is_ok() {
                    self.counters.completed += 1;
                } else {
                    self.counters.failed += 1;
                }
                debug!(unit_id, request_id, success = result.is_ok(), "request resolved");
                let _ = entry.reply.send(result);
            }
            None => debug!(unit_id, request_id, "dropping result for unknown request"),
        }

        let Some(slot) = self.units.get_mut(&unit_id) else {
            return;
        };
        if slot.current_request == Some(request_id) {
            slot.state = UnitState::Idle;
            slot.current_request = None;
        }
        if slot.state == UnitState::Idle && self.policy.over_capacity(self.units.len()) {
            debug!(unit_id, "retiring unit above capacity");
            self.remove_unit(unit_id);
        }
    }

    fn on_crash(
        &mut self,
        unit_id: UnitId,
        request_id: Option<RequestId>,
        reason: String,
        now_ms: u64,
    ) {
        let Some(slot) = self.units.get(&unit_id) else {
            debug!(unit_id, "crash reported by unknown unit");
            return;
        };
        let owned = slot.current_request.or(request_id);
        warn!(unit_id, request_id = ?owned, %reason, "unit crashed");
        self.counters.crashed_units += 1;
        self.remove_unit(unit_id);

        if let Some(entry) = owned.and_then(|id| self.take_pending(id, unit_id)) {
            self.counters.failed += 1;
            let _ = entry.reply.send(Err(SchedulerError::Crash { unit_id, reason }));
        }
        self.restore_floor(now_ms);
    }

    fn take_pending(&mut self, request_id: RequestId, unit_id: UnitId) -> Option<PendingEntry> {
        if self.pending.get(&request_id)?.unit_id != unit_id {
            return None;
        }
        let entry = self.pending.remove(&request_id)?;
        self.deadlines.cancel(entry.timer);
        Some(entry)
    }

    fn ensure_floor(&mut self, now_ms: u64) -> Result<(), SchedulerError> {
        if self.terminated {
            return Ok(());
        }
        for _ in 0..self.policy.floor_deficit(self.units.len()) {
            self.spawn(now_ms)?;
        }
        Ok(())
    }

    fn restore_floor(&mut self, now_ms: u64) {
        if let Err(err) = self.ensure_floor(now_ms) {
            error!(error = %err, "failed to restore unit floor");
        }
    }

    fn spawn(&mut self, now_ms: u64) -> Result<UnitId, SchedulerError> {
        let unit_id = self.next_unit_id;
        self.next_unit_id += 1;
        let unit = self.factory.spawn_unit(unit_id, self.events.clone())?;
        self.units.insert(
            unit_id,
            UnitSlot {
                unit,
                state: UnitState::Idle,
                current_request: None,
                last_activity_ms: now_ms,
            },
        );
        self.counters.spawned_units += 1;
        debug!(unit_id, total = self.units.len(), "unit added");
        Ok(unit_id)
    }

    fn remove_unit(&mut self, unit_id: UnitId) {
        if let Some(mut slot) = self.units.remove(&unit_id) {
            slot.unit.terminate();
            slot.state = UnitState::Terminated;
        }
    }

    fn first_idle(&self) -> Option<UnitId> {
        self.units
            .iter()
            .find(|(_, slot)| slot.state == UnitState::Idle)
            .map(|(id, _)| *id)
    }

    fn idle_units(&self) -> Vec<IdleUnit> {
        self.units
            .iter()
            .filter(|(_, slot)| slot.state == UnitState::Idle)
            .map(|(id, slot)| IdleUnit {
                unit_id: *id,
                last_activity_ms: slot.last_activity_ms,
            })
            .collect()
    }
}

impl<F: UnitFactory> Drop for PoolState<F> {
    fn drop(&mut self) {
        self.terminate();
    }
}
