//! Reconnect policy for the optional feed supervisor
//!
//! The feed adapter itself never reconnects. When `auto_reconnect` is on,
//! the client re-runs connection attempts with the delays computed here:
//! bounded exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Consecutive failed sessions tolerated before the supervisor gives up
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Fraction of the delay randomized in either direction; 0 disables it
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl ReconnectPolicy {
    pub fn builder() -> ReconnectPolicyBuilder {
        ReconnectPolicyBuilder::default()
    }

    /// Un-jittered delay before reconnect number `attempt` (1-based).
    ///
    /// Total for any policy, validated or not: results stay within
    /// `0..=max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(scaled.max(0.0)).unwrap_or(self.max_delay)
    }

    /// Delay to sleep before reconnect number `attempt`, never above `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !(self.jitter > 0.0) || base.is_zero() {
            return base;
        }

        let spread = base.as_secs_f64() * self.jitter.min(1.0);
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        let jittered = (base.as_secs_f64() + offset).max(0.0);
        Duration::try_from_secs_f64(jittered)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `failures` consecutive failures
    pub fn allows_attempt(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Reconnect attempts must be at least 1".to_string());
        }
        if self.initial_delay.is_zero() || self.max_delay < self.initial_delay {
            return Err(format!(
                "Reconnect delays must satisfy 0 < initial ({:?}) <= max ({:?})",
                self.initial_delay, self.max_delay
            ));
        }
        if !(self.multiplier >= 1.0) {
            return Err("Reconnect multiplier must be at least 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("Reconnect jitter must be within 0.0..=1.0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ReconnectPolicyBuilder {
    policy: ReconnectPolicy,
}

impl ReconnectPolicyBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, fraction: f64) -> Self {
        self.policy.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Deterministic delays, mostly useful in tests
    pub fn without_jitter(self) -> Self {
        self.jitter(0.0)
    }

    pub fn build(self) -> ReconnectPolicy {
        self.policy
    }
}
