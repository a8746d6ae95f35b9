//! # Platform Configuration
//!
//! One configuration for every subsystem, with defaults and `CL_*`
//! environment overrides.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `CL_CALL_TIMEOUT_MS` | `resilience.call_timeout` | 2000 |
//! | `CL_BREAKER_FAILURE_THRESHOLD` | `resilience.breaker.failure_threshold` | 5 |
//! | `CL_BREAKER_SUCCESS_THRESHOLD` | `resilience.breaker.success_threshold` | 3 |
//! | `CL_BREAKER_OPEN_TIMEOUT_MS` | `resilience.breaker.open_timeout` | 30000 |
//! | `CL_BREAKER_ENABLED` | `resilience.breaker.enabled` | true |
//! | `CL_CACHE_TTL_SECS` | `cache.ttl` (0 disables expiry) | 300 |
//! | `CL_CACHE_MAX_ENTRIES` | `cache.max_entries` | 10000 |
//! | `CL_CACHE_CREATE_INVALIDATION` | `cache.create_invalidation` (`key`/`region`) | key |
//! | `CL_SAGA_RECOVERY_GRACE_MS` | `saga.recovery_grace` | 30000 |
//! | `CL_SAGA_MAX_ATTEMPTS` | `saga.max_attempts` | 5 |
//! | `CL_SAGA_SWEEP_INTERVAL_MS` | `saga.sweep_interval` | 15000 |
//! | `CL_LEADERBOARD_USER_WINDOW` | `leaderboard.user_window` | 100 |
//! | `CL_LEADERBOARD_GROUP_WINDOW` | `leaderboard.group_window` | 50 |
//! | `CL_BUS_CAPACITY` | `bus.channel_capacity` | 1000 |
//! | `CL_DEDUP_WINDOW_MS` | `bus.dedup_window_ms` | 600000 |

use cl_02_resilience::{CacheConfig, CreateInvalidation, ResilienceConfig};
use cl_03_contest::SagaConfig;
use cl_05_leaderboard::LeaderboardConfig;
use shared_bus::{TimeBoundedDedupCache, DEFAULT_CHANNEL_CAPACITY};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("{var}: cannot parse '{value}'")]
    Unparseable { var: &'static str, value: String },

    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Event bus and consumer settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broadcast buffer per subscriber.
    pub channel_capacity: usize,
    /// How long the notification consumer remembers event ids.
    pub dedup_window_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            dedup_window_ms: TimeBoundedDedupCache::DEFAULT_WINDOW_MS,
        }
    }
}

/// Complete platform configuration.
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    pub resilience: ResilienceConfig,
    pub cache: CacheConfig,
    pub saga: SagaConfig,
    pub leaderboard: LeaderboardConfig,
    pub bus: BusConfig,
}

impl PlatformConfig {
    /// Defaults overridden by `CL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let mut config = Self::default();

        if let Some(ms) = env.parse::<u64>("CL_CALL_TIMEOUT_MS")? {
            config.resilience.call_timeout = Duration::from_millis(ms);
        }
        let breaker = &mut config.resilience.breaker;
        if let Some(n) = env.parse("CL_BREAKER_FAILURE_THRESHOLD")? {
            breaker.failure_threshold = n;
        }
        if let Some(n) = env.parse("CL_BREAKER_SUCCESS_THRESHOLD")? {
            breaker.success_threshold = n;
        }
        if let Some(ms) = env.parse::<u64>("CL_BREAKER_OPEN_TIMEOUT_MS")? {
            breaker.open_timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = env.parse("CL_BREAKER_ENABLED")? {
            breaker.enabled = enabled;
        }

        if let Some(secs) = env.parse::<u64>("CL_CACHE_TTL_SECS")? {
            config.cache.ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(n) = env.parse("CL_CACHE_MAX_ENTRIES")? {
            config.cache.max_entries = n;
        }
        if let Some(policy) = env.raw("CL_CACHE_CREATE_INVALIDATION") {
            config.cache.create_invalidation = match policy.to_lowercase().as_str() {
                "key" => CreateInvalidation::Key,
                "region" => CreateInvalidation::Region,
                _ => {
                    return Err(ConfigError::Unparseable {
                        var: "CL_CACHE_CREATE_INVALIDATION",
                        value: policy,
                    })
                }
            };
        }

        if let Some(ms) = env.parse::<u64>("CL_SAGA_RECOVERY_GRACE_MS")? {
            config.saga.recovery_grace = Duration::from_millis(ms);
        }
        if let Some(n) = env.parse("CL_SAGA_MAX_ATTEMPTS")? {
            config.saga.max_attempts = n;
        }
        if let Some(ms) = env.parse::<u64>("CL_SAGA_SWEEP_INTERVAL_MS")? {
            config.saga.sweep_interval = Duration::from_millis(ms);
        }

        if let Some(n) = env.parse("CL_LEADERBOARD_USER_WINDOW")? {
            config.leaderboard.user_window = n;
        }
        if let Some(n) = env.parse("CL_LEADERBOARD_GROUP_WINDOW")? {
            config.leaderboard.group_window = n;
        }

        if let Some(n) = env.parse("CL_BUS_CAPACITY")? {
            config.bus.channel_capacity = n;
        }
        if let Some(ms) = env.parse("CL_DEDUP_WINDOW_MS")? {
            config.bus.dedup_window_ms = ms;
        }

        Ok(config)
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require(ok: bool, field: &'static str, reason: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: reason.to_string(),
                })
            }
        }

        let breaker = &self.resilience.breaker;
        require(
            !self.resilience.call_timeout.is_zero(),
            "call_timeout",
            "must be positive",
        )?;
        require(breaker.failure_threshold > 0, "failure_threshold", "must be at least 1")?;
        require(breaker.success_threshold > 0, "success_threshold", "must be at least 1")?;
        require(self.cache.max_entries > 0, "cache.max_entries", "must be at least 1")?;
        require(self.saga.max_attempts > 0, "saga.max_attempts", "must be at least 1")?;
        require(
            !self.saga.sweep_interval.is_zero(),
            "saga.sweep_interval",
            "must be positive",
        )?;
        require(
            self.leaderboard.user_window > 0 && self.leaderboard.group_window > 0,
            "leaderboard window",
            "must be at least 1",
        )?;
        require(self.bus.channel_capacity > 0, "bus.channel_capacity", "must be at least 1")?;
        Ok(())
    }
}

struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn raw(&self, var: &str) -> Option<String> {
        (self.0)(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, var: &'static str) -> Result<Option<T>, ConfigError> {
        match self.raw(var) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Unparseable { var, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PlatformConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.leaderboard.user_window, 100);
        assert_eq!(config.cache.create_invalidation, CreateInvalidation::Key);
    }

    #[test]
    fn test_overrides() {
        let config = PlatformConfig::from_lookup(lookup(&[
            ("CL_CALL_TIMEOUT_MS", "250"),
            ("CL_BREAKER_FAILURE_THRESHOLD", "2"),
            ("CL_CACHE_TTL_SECS", "0"),
            ("CL_CACHE_CREATE_INVALIDATION", "Region"),
            ("CL_SAGA_MAX_ATTEMPTS", "9"),
            ("CL_LEADERBOARD_GROUP_WINDOW", "10"),
        ]))
        .unwrap();
        assert_eq!(config.resilience.call_timeout, Duration::from_millis(250));
        assert_eq!(config.resilience.breaker.failure_threshold, 2);
        assert_eq!(config.cache.ttl, None);
        assert_eq!(config.cache.create_invalidation, CreateInvalidation::Region);
        assert_eq!(config.saga.max_attempts, 9);
        assert_eq!(config.leaderboard.group_window, 10);
    }

    #[test]
    fn test_unparseable_value_is_reported() {
        let err = PlatformConfig::from_lookup(lookup(&[("CL_SAGA_MAX_ATTEMPTS", "many")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Unparseable {
                var: "CL_SAGA_MAX_ATTEMPTS",
                value: "many".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = PlatformConfig::default();
        config.saga.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "saga.max_attempts", .. })
        ));
    }
}
