//! Upstream availability gate
//!
//! Counts consecutive upstream failures. When the count reaches the threshold
//! the gate opens: upstream calls are suspended until the cooldown deadline
//! passes, after which the first availability check resets the count and
//! lets calls through again. Any success resets the count.

use crate::clock::SharedClock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gate configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30 * 60),
        }
    }
}

impl From<&config::CircuitBreakerSettings> for GateConfig {
    fn from(settings: &config::CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            cooldown: Duration::from_secs(settings.cooldown_seconds),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GateState {
    consecutive_failures: u32,
    disabled_until: Option<DateTime<Utc>>,
}

/// Point-in-time view of the gate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateStatus {
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub disabled_until: Option<DateTime<Utc>>,
    pub available: bool,
}

#[derive(Debug)]
pub struct UpstreamGate {
    config: GateConfig,
    state: Mutex<GateState>,
    clock: SharedClock,
}

impl UpstreamGate {
    pub fn new(config: GateConfig, clock: SharedClock) -> Self {
        Self {
            config,
            state: Mutex::new(GateState::default()),
            clock,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.cooldown)
            .ok()
            .and_then(|cooldown| now.checked_add_signed(cooldown))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether an upstream call may be attempted now.
    ///
    /// Reopens the gate (and resets the failure count) on the first check
    /// at or after the cooldown deadline.
    pub fn is_available(&self) -> bool {
        let mut state = self.state.lock();
        if state.consecutive_failures < self.config.failure_threshold {
            return true;
        }

        let now = self.clock.now();
        match state.disabled_until {
            Some(until) if now < until => false,
            _ => {
                *state = GateState::default();
                info!("Upstream cooldown elapsed, resuming upstream calls");
                true
            }
        }
    }

    /// Record a failed upstream call. Returns `true` when this failure opened the gate.
    ///
    /// The count is held at the threshold while the gate is open, so failures
    /// from calls already in flight do not push the deadline out.
    pub fn record_failure(&self, reason: &str) -> bool {
        let mut state = self.state.lock();
        if state.consecutive_failures >= self.config.failure_threshold {
            debug!(reason, "Upstream failure while gate already open");
            return false;
        }

        state.consecutive_failures += 1;
        let failures = state.consecutive_failures;

        if failures < self.config.failure_threshold {
            warn!(
                failures,
                threshold = self.config.failure_threshold,
                reason,
                "Upstream failure recorded"
            );
            return false;
        }

        let until = self.deadline_from(self.clock.now());
        state.disabled_until = Some(until);
        warn!(
            failures,
            disabled_until = %until,
            reason,
            "Upstream failure threshold reached, suspending upstream calls"
        );
        true
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.consecutive_failures > 0 {
            debug!(
                previous_failures = state.consecutive_failures,
                "Upstream success, failure count reset"
            );
        }
        state.consecutive_failures = 0;
    }

    /// Open the gate for one full cooldown regardless of the failure count
    pub fn trip(&self) {
        let until = self.deadline_from(self.clock.now());
        let mut state = self.state.lock();
        state.consecutive_failures = self.config.failure_threshold;
        state.disabled_until = Some(until);
        warn!(disabled_until = %until, "Upstream gate tripped manually");
    }

    pub fn reset(&self) {
        *self.state.lock() = GateState::default();
        info!("Upstream gate reset");
    }

    /// Current state. Does not reopen an elapsed gate.
    pub fn status(&self) -> GateStatus {
        let now = self.clock.now();
        let state = self.state.lock();
        let available = state.consecutive_failures < self.config.failure_threshold
            || state.disabled_until.map_or(true, |until| now >= until);

        GateStatus {
            consecutive_failures: state.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            disabled_until: state.disabled_until,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn gate() -> (UpstreamGate, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap());
        let gate = UpstreamGate::new(GateConfig::default(), Arc::new(clock.clone()));
        (gate, clock)
    }

    #[test]
    fn test_fresh_gate_is_available() {
        let (gate, _) = gate();
        assert!(gate.is_available());
        assert_eq!(gate.status().consecutive_failures, 0);
    }

    #[test]
    fn test_opens_after_threshold() {
        let (gate, clock) = gate();
        for _ in 0..4 {
            assert!(!gate.record_failure("timeout"));
        }
        assert!(gate.is_available());

        assert!(gate.record_failure("timeout"));
        assert!(!gate.is_available());

        let status = gate.status();
        assert_eq!(status.consecutive_failures, 5);
        assert_eq!(status.disabled_until, Some(clock.now() + chrono::Duration::minutes(30)));
        assert!(!status.available);
    }

    #[test]
    fn test_reopens_at_deadline() {
        let (gate, clock) = gate();
        for _ in 0..5 {
            gate.record_failure("connection");
        }

        clock.advance(chrono::Duration::minutes(30) - chrono::Duration::seconds(1));
        assert!(!gate.is_available());

        clock.advance(chrono::Duration::seconds(1));
        assert!(gate.is_available());

        let status = gate.status();
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.disabled_until.is_none());
    }

    #[test]
    fn test_success_resets_count() {
        let (gate, _) = gate();
        for _ in 0..4 {
            gate.record_failure("provider");
        }
        gate.record_success();
        // Failures must be consecutive to open the gate
        for _ in 0..4 {
            gate.record_failure("provider");
        }
        assert!(gate.is_available());
    }

    #[test]
    fn test_success_after_threshold_makes_available() {
        let (gate, _) = gate();
        for _ in 0..5 {
            gate.record_failure("provider");
        }
        assert!(!gate.is_available());

        gate.record_success();
        assert!(gate.is_available());
    }

    #[test]
    fn test_failures_while_open_keep_deadline() {
        let (gate, clock) = gate();
        for _ in 0..5 {
            gate.record_failure("timeout");
        }
        let deadline = gate.status().disabled_until;

        clock.advance(chrono::Duration::minutes(10));
        assert!(!gate.record_failure("timeout"));

        let status = gate.status();
        assert_eq!(status.consecutive_failures, 5);
        assert_eq!(status.disabled_until, deadline);
    }

    #[test]
    fn test_status_does_not_reopen() {
        let (gate, clock) = gate();
        gate.trip();
        clock.advance(chrono::Duration::minutes(31));

        let status = gate.status();
        assert!(status.available);
        assert_eq!(status.consecutive_failures, 5);
    }

    #[test]
    fn test_trip_and_reset() {
        let (gate, _) = gate();
        gate.trip();
        assert!(!gate.is_available());

        gate.reset();
        assert!(gate.is_available());
        assert_eq!(gate.status().disabled_until, None);
    }

    #[test]
    fn test_from_settings() {
        let settings = config::CircuitBreakerSettings {
            failure_threshold: 3,
            cooldown_seconds: 60,
        };
        let config = GateConfig::from(&settings);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(
            GateConfig::from(&config::CircuitBreakerSettings::default()),
            GateConfig::default()
        );
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let clock = ManualClock::new(Utc::now());
        let gate = UpstreamGate::new(
            GateConfig {
                failure_threshold: 1_000,
                cooldown: Duration::from_secs(60),
            },
            Arc::new(clock),
        );

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        gate.record_failure("connection");
                    }
                });
            }
        });

        assert_eq!(gate.status().consecutive_failures, 800);
        assert!(gate.is_available());
    }
}
