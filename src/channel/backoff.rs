use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::error::{Result, TrackerError};

/// Reconnect schedule for the update channel: capped exponential backoff
/// with proportional jitter.
///
/// `multiplier = 1.0` with `jitter = 0.0` gives a fixed interval.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Fraction of the computed delay that is randomized, in `[0.0, 1.0]`.
    pub jitter: f64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Retry forever at a constant interval.
    pub fn fixed(interval: Duration) -> Self {
        let ms = interval.as_millis() as u64;
        Self {
            initial_delay_ms: ms,
            max_delay_ms: ms,
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.multiplier < 1.0 || !self.multiplier.is_finite() {
            return Err(TrackerError::ConfigValidationError(format!(
                "reconnect.multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(TrackerError::ConfigValidationError(format!(
                "reconnect.jitter must be between 0.0 and 1.0, got {}",
                self.jitter
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(TrackerError::ConfigValidationError(format!(
                "reconnect.max_delay_ms ({}) must be >= initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(TrackerError::ConfigValidationError(
                "reconnect.max_attempts must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// Delay before the given reconnect attempt (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// Delay before the given reconnect attempt (1-based), jittered
    /// within `base * (1 ± jitter)` and never above the cap.
    pub fn delay_for_attempt<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        if self.jitter <= 0.0 || base == 0.0 {
            return Duration::from_millis(base as u64);
        }
        let spread = base * self.jitter;
        let jittered = rng.gen_range((base - spread)..=(base + spread));
        Duration::from_millis(jittered.clamp(0.0, self.max_delay_ms as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_starts_at_three_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(3));
        assert_eq!(policy.base_delay(2), Duration::from_secs(6));
        assert_eq!(policy.base_delay(3), Duration::from_secs(12));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(10), Duration::from_secs(30));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_fixed_policy_never_grows() {
        let policy = ReconnectPolicy::fixed(Duration::from_secs(3));
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..20 {
            assert_eq!(
                policy.delay_for_attempt(attempt, &mut rng),
                Duration::from_secs(3)
            );
        }
        assert!(policy.allows(1_000_000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = ReconnectPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let delay = policy.delay_for_attempt(1, &mut rng).as_millis();
            assert!((2400..=3600).contains(&delay), "delay {} out of range", delay);
        }
        for _ in 0..200 {
            let delay = policy.delay_for_attempt(12, &mut rng).as_millis();
            assert!(delay <= 30_000);
        }
    }

    #[test]
    fn test_max_attempts() {
        let policy = ReconnectPolicy {
            max_attempts: Some(2),
            ..Default::default()
        };
        assert!(policy.allows(1));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_jitter = ReconnectPolicy {
            jitter: 1.5,
            ..Default::default()
        };
        assert!(bad_jitter.validate().is_err());

        let shrinking = ReconnectPolicy {
            multiplier: 0.5,
            ..Default::default()
        };
        assert!(shrinking.validate().is_err());

        let inverted = ReconnectPolicy {
            initial_delay_ms: 10_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        assert!(ReconnectPolicy::default().validate().is_ok());
    }
}
