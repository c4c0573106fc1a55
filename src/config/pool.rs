//! Pool configuration: capacity ceiling/floor, timeouts and sweep cadence.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Default per-request timeout, measured from dispatch.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 20_000;
/// Default idle time after which a unit above the floor is reclaimed.
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 30_000;
/// Default period of the idle sweep.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 10_000;
/// Default stack size for unit threads.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;
const ENV_PREFIX: &str = "SERIESGEN_";

/// Scheduler pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Ceiling on live execution units.
    pub max_capacity: usize,
    /// Floor of warm units kept alive outside of shutdown.
    pub min_floor: usize,
    /// Per-request timeout in milliseconds, counted from dispatch.
    pub request_timeout_ms: u64,
    /// Idle time in milliseconds before a unit becomes reclaimable.
    pub idle_threshold_ms: u64,
    /// Period of the idle sweep in milliseconds.
    pub sweep_interval_ms: u64,
    /// Stack size for each unit thread in bytes.
    pub thread_stack_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_capacity: num_cpus::get().max(1),
            min_floor: 1,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl PoolConfig {
    /// Configuration with defaults (capacity = logical CPU count).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unit ceiling.
    #[must_use]
    pub const fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set the warm-unit floor.
    #[must_use]
    pub const fn with_min_floor(mut self, min_floor: usize) -> Self {
        self.min_floor = min_floor;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Set the idle threshold.
    #[must_use]
    pub const fn with_idle_threshold_ms(mut self, ms: u64) -> Self {
        self.idle_threshold_ms = ms;
        self
    }

    /// Set the idle sweep period.
    #[must_use]
    pub const fn with_sweep_interval_ms(mut self, ms: u64) -> Self {
        self.sweep_interval_ms = ms;
        self
    }

    /// Set the unit thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Sweep period as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_capacity == 0 {
            return Err("max_capacity must be greater than 0".into());
        }
        if self.min_floor > self.max_capacity {
            return Err(format!(
                "min_floor ({}) must not exceed max_capacity ({})",
                self.min_floor, self.max_capacity
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err("request_timeout_ms must be greater than 0".into());
        }
        if self.idle_threshold_ms == 0 {
            return Err("idle_threshold_ms must be greater than 0".into());
        }
        if self.sweep_interval_ms == 0 {
            return Err("sweep_interval_ms must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_THREAD_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `SERIESGEN_*` environment variables, reading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails if a variable is not a valid number or the result is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (used by
    /// [`Self::from_env`]).
    ///
    /// # Errors
    ///
    /// Fails if a value is not a valid number or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = read_var(&lookup, "MAX_CAPACITY")? {
            cfg.max_capacity = v;
        }
        if let Some(v) = read_var(&lookup, "MIN_FLOOR")? {
            cfg.min_floor = v;
        }
        if let Some(v) = read_var(&lookup, "REQUEST_TIMEOUT_MS")? {
            cfg.request_timeout_ms = v;
        }
        if let Some(v) = read_var(&lookup, "IDLE_THRESHOLD_MS")? {
            cfg.idle_threshold_ms = v;
        }
        if let Some(v) = read_var(&lookup, "SWEEP_INTERVAL_MS")? {
            cfg.sweep_interval_ms = v;
        }
        if let Some(v) = read_var(&lookup, "THREAD_STACK_SIZE")? {
            cfg.thread_stack_size = v;
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn read_var<F, T>(lookup: &F, name: &str) -> AppResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let key = format!("{ENV_PREFIX}{name}");
    lookup(&key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has invalid value `{raw}`"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = PoolConfig::new();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.min_floor, 1);
        assert_eq!(cfg.request_timeout_ms, 20_000);
        assert_eq!(cfg.idle_threshold_ms, 30_000);
        assert_eq!(cfg.sweep_interval_ms, 10_000);
        assert!(cfg.max_capacity >= 1);
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("SERIESGEN_MAX_CAPACITY", "6"),
            ("SERIESGEN_MIN_FLOOR", "2"),
            ("SERIESGEN_REQUEST_TIMEOUT_MS", " 500 "),
        ]
        .into_iter()
        .collect();

        let cfg = PoolConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(cfg.max_capacity, 6);
        assert_eq!(cfg.min_floor, 2);
        assert_eq!(cfg.request_timeout_ms, 500);
        assert_eq!(cfg.idle_threshold_ms, DEFAULT_IDLE_THRESHOLD_MS);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = PoolConfig::from_lookup(|k| {
            (k == "SERIESGEN_MAX_CAPACITY").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("SERIESGEN_MAX_CAPACITY"));
    }

    #[test]
    fn test_lookup_rejects_floor_above_capacity() {
        let result = PoolConfig::from_lookup(|k| match k {
            "SERIESGEN_MAX_CAPACITY" => Some("2".into()),
            "SERIESGEN_MIN_FLOOR" => Some("3".into()),
            _ => None,
        });
        assert!(result.is_err());
    }
}
