//! # Global orchestrator configuration.
//!
//! Provides [`Config`] centralized settings for the orchestrator runtime.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Orchestrator::builder(config)`
//! 2. **Entry point defaults**: `wake_up()` / `healthcheck()` pick their timeout from here
//!
//! ## Sentinel values
//! - `wakeup_timeout = 0s` → the caller waits for the whole readiness cascade
//! - `healthcheck_timeout = 0s` → the caller waits for the whole probe
//! - `max_forwards = 0` → forwarding disabled (every forward fails with `ForwardLimit`)

use std::time::Duration;

/// Global configuration for the orchestrator runtime.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `wakeup_timeout`: Default caller-side wait for `wake_up()` (`0s` = unbounded)
/// - `healthcheck_timeout`: Default caller-side wait for `healthcheck()` (`0s` = unbounded)
/// - `max_forwards`: Longest forwarding chain a single signal may trigger
///
/// Timeouts are advisory: when one elapses the caller gets
/// `OrchestratorError::Timeout` while the signal keeps being processed in the background.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Default wait applied by `Orchestrator::wake_up`.
    pub wakeup_timeout: Duration,

    /// Default wait applied by `Orchestrator::healthcheck`.
    pub healthcheck_timeout: Duration,

    /// Maximum number of forwarding steps per signal.
    ///
    /// The readiness pipeline needs four (`initialize → check → activate → healthy|sick`
    /// plus a possible jump to `terminate`); the default leaves room for custom tables.
    pub max_forwards: usize,
}

impl Config {
    /// Returns the default wake-up timeout as an `Option`.
    ///
    /// - `None` → wait for the cascade to settle
    /// - `Some(d)` → give up waiting after `d`
    #[inline]
    pub fn wakeup_timeout(&self) -> Option<Duration> {
        non_zero(self.wakeup_timeout)
    }

    /// Returns the default healthcheck timeout as an `Option`.
    #[inline]
    pub fn healthcheck_timeout(&self) -> Option<Duration> {
        non_zero(self.healthcheck_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

#[inline]
fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO { None } else { Some(d) }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `wakeup_timeout = 0s` (unbounded)
    /// - `healthcheck_timeout = 0s` (unbounded)
    /// - `max_forwards = 16`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            wakeup_timeout: Duration::ZERO,
            healthcheck_timeout: Duration::ZERO,
            max_forwards: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeouts_mean_unbounded() {
        let cfg = Config::default();
        assert_eq!(cfg.wakeup_timeout(), None);
        assert_eq!(cfg.healthcheck_timeout(), None);
    }

    #[test]
    fn test_explicit_timeouts_are_kept() {
        let cfg = Config {
            wakeup_timeout: Duration::from_millis(250),
            healthcheck_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        assert_eq!(cfg.wakeup_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(cfg.healthcheck_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
