//! Cancellable deadlines keyed by request.
//!
//! A min-heap of `(deadline_ms, token)` with lazy cancellation: cancelled
//! tokens stay in the heap until they surface or a compaction drops them.
//! Time is plain milliseconds supplied by the caller, so expiry is driven
//! explicitly and tests never wait on a real clock.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Handle to a scheduled deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Cancellable deadline queue.
#[derive(Debug)]
pub struct DeadlineQueue<K> {
    heap: BinaryHeap<Reverse<(u64, TimerToken)>>,
    live: HashMap<TimerToken, K>,
    next_token: u64,
}

impl<K> Default for DeadlineQueue<K> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_token: 0,
        }
    }
}

impl<K> DeadlineQueue<K> {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to expire at `at_ms`.
    pub fn schedule(&mut self, at_ms: u64, key: K) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.heap.push(Reverse((at_ms, token)));
        self.live.insert(token, key);
        token
    }

    /// Cancel a deadline, returning its key if it was still live.
    pub fn cancel(&mut self, token: TimerToken) -> Option<K> {
        let key = self.live.remove(&token);
        if self.heap.len() > 64 && self.heap.len() > self.live.len() * 2 {
            let live = &self.live;
            self.heap.retain(|Reverse((_, t))| live.contains_key(t));
        }
        key
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<u64> {
        while let Some(Reverse((at, token))) = self.heap.peek().copied() {
            if self.live.contains_key(&token) {
                return Some(at);
            }
            self.heap.pop();
        }
        None
    }

    /// Remove and return every live key due at or before `now_ms`, earliest
    /// first.
    pub fn pop_expired(&mut self, now_ms: u64) -> Vec<K> {
        let mut expired = Vec::new();
        while let Some(Reverse((at, token))) = self.heap.peek().copied() {
            if at > now_ms {
                break;
            }
            self.heap.pop();
            if let Some(key) = self.live.remove(&token) {
                expired.push(key);
            }
        }
        expired
    }

    /// Number of live deadlines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no deadline is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Drop every deadline.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }
}
