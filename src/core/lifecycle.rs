//! Unit-count policy: lazy growth up to a ceiling, a warm floor, and idle
//! reclamation.

use crate::config::PoolConfig;
use crate::core::message::UnitId;

/// An idle unit considered by the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleUnit {
    /// Unit id.
    pub unit_id: UnitId,
    /// Last time the unit was dispatched to or reported back.
    pub last_activity_ms: u64,
}

/// Capacity ceiling, warm floor and idle threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Ceiling on live units.
    pub max_capacity: usize,
    /// Floor of warm units.
    pub min_floor: usize,
    /// Idle time after which a unit above the floor may be reclaimed.
    pub idle_threshold_ms: u64,
}

impl LifecyclePolicy {
    /// Policy from pool configuration.
    #[must_use]
    pub const fn from_config(config: &PoolConfig) -> Self {
        Self {
            max_capacity: config.max_capacity,
            min_floor: config.min_floor,
            idle_threshold_ms: config.idle_threshold_ms,
        }
    }

    /// Whether another unit may be spawned.
    #[must_use]
    pub const fn can_spawn(&self, total: usize) -> bool {
        total < self.max_capacity
    }

    /// Units missing to reach the floor.
    #[must_use]
    pub const fn floor_deficit(&self, total: usize) -> usize {
        self.min_floor.saturating_sub(total)
    }

    /// Whether the pool holds more units than the ceiling allows.
    #[must_use]
    pub const fn over_capacity(&self, total: usize) -> bool {
        total > self.max_capacity
    }

    /// Change the ceiling. The floor follows it down if needed.
    pub fn resize(&mut self, max_capacity: usize) {
        self.max_capacity = max_capacity;
        self.min_floor = self.min_floor.min(max_capacity);
    }

    /// Pick idle units to terminate, oldest first.
    ///
    /// A unit is picked if its idle time exceeds the threshold or the pool
    /// is above its ceiling, and only while more than `min_floor` units
    /// would remain.
    #[must_use]
    pub fn select_reclaimable(&self, idle: &[IdleUnit], total: usize, now_ms: u64) -> Vec<UnitId> {
        let mut candidates = idle.to_vec();
        candidates.sort_by_key(|u| (u.last_activity_ms, u.unit_id));

        let mut remaining = total;
        let mut picked = Vec::new();
        for unit in candidates {
            if remaining <= self.min_floor {
                break;
            }
            let expired = now_ms.saturating_sub(unit.last_activity_ms) > self.idle_threshold_ms;
            if expired || self.over_capacity(remaining) {
                picked.push(unit.unit_id);
                remaining -= 1;
            }
        }
        picked
    }

    /// Pick idle units to retire so the pool fits under its ceiling, oldest
    /// first. Idle time is not considered.
    #[must_use]
    pub fn select_surplus(&self, idle: &[IdleUnit], total: usize) -> Vec<UnitId> {
        let mut candidates = idle.to_vec();
        candidates.sort_by_key(|u| (u.last_activity_ms, u.unit_id));
        let surplus = total.saturating_sub(self.max_capacity);
        candidates.into_iter().take(surplus).map(|u| u.unit_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LifecyclePolicy {
        LifecyclePolicy {
            max_capacity: 4,
            min_floor: 1,
            idle_threshold_ms: 30_000,
        }
    }

    fn idle(unit_id: UnitId, last_activity_ms: u64) -> IdleUnit {
        IdleUnit {
            unit_id,
            last_activity_ms,
        }
    }

    #[test]
    fn spawn_and_floor_accounting() {
        let p = policy();
        assert!(p.can_spawn(3));
        assert!(!p.can_spawn(4));
        assert_eq!(p.floor_deficit(0), 1);
        assert_eq!(p.floor_deficit(2), 0);
        assert!(p.over_capacity(5));
    }

    #[test]
    fn reclaims_only_expired_units() {
        let p = policy();
        let units = [idle(1, 0), idle(2, 50_000), idle(3, 10_000)];
        // now = 45_000: units 1 and 3 idle for more than 30s
        assert_eq!(p.select_reclaimable(&units, 4, 45_000), vec![1, 3]);
    }

    #[test]
    fn never_reclaims_below_floor() {
        let p = policy();
        let units = [idle(1, 0), idle(2, 0)];
        assert_eq!(p.select_reclaimable(&units, 2, 100_000), vec![1]);
        assert!(p.select_reclaimable(&units[..1], 1, 100_000).is_empty());
    }

    #[test]
    fn threshold_must_be_exceeded() {
        let p = policy();
        assert!(p.select_reclaimable(&[idle(1, 0)], 2, 30_000).is_empty());
        assert_eq!(p.select_reclaimable(&[idle(1, 0)], 2, 30_001), vec![1]);
    }

    #[test]
    fn resize_trims_fresh_idle_units_above_ceiling() {
        let mut p = policy();
        p.resize(2);
        // 4 units, 3 idle and fresh, ceiling 2: two must go
        let units = [idle(1, 100), idle(2, 90), idle(3, 110)];
        assert_eq!(p.select_reclaimable(&units, 4, 120), vec![2, 1]);
    }

    #[test]
    fn surplus_ignores_idle_time() {
        let p = LifecyclePolicy {
            max_capacity: 1,
            ..policy()
        };
        let units = [idle(3, 500), idle(1, 700), idle(2, 100)];
        assert_eq!(p.select_surplus(&units, 3), vec![2, 3]);
        assert_eq!(p.select_surplus(&units[..1], 3), vec![3]);
        assert!(p.select_surplus(&units, 1).is_empty());
    }

    #[test]
    fn resize_lowers_floor() {
        let mut p = LifecyclePolicy {
            max_capacity: 4,
            min_floor: 3,
            idle_threshold_ms: 1,
        };
        p.resize(2);
        assert_eq!((p.max_capacity, p.min_floor), (2, 2));
    }
}
