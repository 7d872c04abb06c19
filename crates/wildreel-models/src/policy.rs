//! Sourcing policies: quota handling and partial-success thresholds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of candidates a sourcing run aims for.
pub const DEFAULT_TARGET_COUNT: usize = 30;
/// Default fraction of the target that must be reached before assembly
/// may proceed.
pub const DEFAULT_MIN_FRACTION: f64 = 2.0 / 3.0;
/// Default cooldown before resuming after a quota signal, when the
/// resume policy is selected. Provider quotas refill on the order of
/// tens of minutes.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30 * 60);
/// Default attempt ceiling as a multiple of the target count.
pub const DEFAULT_ATTEMPTS_PER_TARGET: usize = 10;

/// Errors from policy validation.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("minimum fraction must be in (0, 1], got {0}")]
    InvalidFraction(f64),

    #[error("target count must be at least 1")]
    ZeroTarget,
}

/// How the sourcing loop reacts to a provider quota-exhaustion signal.
///
/// The two modes are alternatives, selected by configuration; the loop
/// never mixes them within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPolicy {
    /// Stop querying immediately and evaluate the partial-success policy.
    #[default]
    Abort,
    /// Sleep for the cooldown interval, then resume querying. Candidates
    /// already accepted are retained across the pause.
    CooldownResume { cooldown: Duration },
}

/// Tunables for one sourcing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcingPolicy {
    /// Number of candidates to aim for.
    pub target_count: usize,
    /// Fraction of `target_count` below which the run fails.
    pub min_fraction: f64,
    /// Reaction to quota exhaustion.
    pub quota_policy: QuotaPolicy,
    /// Hard ceiling on provider queries, so a never-accepting gate
    /// cannot spin forever.
    pub max_attempts: usize,
}

impl Default for SourcingPolicy {
    fn default() -> Self {
        Self {
            target_count: DEFAULT_TARGET_COUNT,
            min_fraction: DEFAULT_MIN_FRACTION,
            quota_policy: QuotaPolicy::default(),
            max_attempts: DEFAULT_TARGET_COUNT * DEFAULT_ATTEMPTS_PER_TARGET,
        }
    }
}

impl SourcingPolicy {
    /// Policy targeting `count` candidates, other fields at defaults.
    pub fn with_target(count: usize) -> Self {
        Self {
            target_count: count,
            max_attempts: count * DEFAULT_ATTEMPTS_PER_TARGET,
            ..Default::default()
        }
    }

    /// Set the minimum acceptance fraction.
    pub fn with_min_fraction(mut self, fraction: f64) -> Self {
        self.min_fraction = fraction;
        self
    }

    /// Set the quota-exhaustion policy.
    pub fn with_quota_policy(mut self, policy: QuotaPolicy) -> Self {
        self.quota_policy = policy;
        self
    }

    /// Set the attempt ceiling.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Check the policy is internally consistent.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.target_count == 0 {
            return Err(PolicyError::ZeroTarget);
        }
        if !(self.min_fraction > 0.0 && self.min_fraction <= 1.0) {
            return Err(PolicyError::InvalidFraction(self.min_fraction));
        }
        Ok(())
    }

    /// Smallest accepted count that clears the partial-success threshold.
    pub fn required_count(&self) -> usize {
        (self.target_count as f64 * self.min_fraction).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = SourcingPolicy::default();
        policy.validate().unwrap();
        assert_eq!(policy.target_count, DEFAULT_TARGET_COUNT);
        assert_eq!(policy.quota_policy, QuotaPolicy::Abort);
    }

    #[test]
    fn test_required_count_rounds_up() {
        let policy = SourcingPolicy::with_target(30);
        assert_eq!(policy.required_count(), 20);

        let policy = SourcingPolicy::with_target(10).with_min_fraction(0.75);
        assert_eq!(policy.required_count(), 8);
    }

    #[test]
    fn test_invalid_fraction_is_rejected() {
        let policy = SourcingPolicy::with_target(10).with_min_fraction(0.0);
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::InvalidFraction(_))
        ));

        let policy = SourcingPolicy::with_target(10).with_min_fraction(1.5);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_zero_target_is_rejected() {
        let policy = SourcingPolicy::with_target(0);
        assert!(matches!(policy.validate(), Err(PolicyError::ZeroTarget)));
    }
}
