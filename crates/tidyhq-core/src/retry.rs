// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry budget and exponential backoff for notification jobs.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Default number of retries granted to a job after its first failed attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);

/// Default backoff ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);

/// Hard ceiling on any single backoff delay (one day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(86_400);

/// Retry budget and backoff shape.
///
/// `delay(attempt) = base_delay * 2^attempt`, capped at `max_delay`.
/// A `max_delay` above [`MAX_BACKOFF`] is clamped to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// What a store must do with a job after a transient delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the job back to `pending` with the new attempt count.
    Retry {
        attempts: u32,
        scheduled_for: DateTime<Utc>,
    },
    /// The budget is spent; the job becomes `failed` for good.
    Exhausted,
}

impl RetryPolicy {
    /// Backoff delay for the given attempt count. Non-decreasing and never
    /// above the effective ceiling.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling();
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(ceiling, |delay| delay.min(ceiling))
    }

    /// `max_delay` clamped to [`MAX_BACKOFF`].
    pub fn ceiling(&self) -> Duration {
        self.max_delay.min(MAX_BACKOFF)
    }

    /// Decides the fate of a job that has used `attempts` of its `max_attempts` retries.
    ///
    /// The attempt counter only moves while budget remains, so it never
    /// exceeds `max_attempts`.
    pub fn on_transient_failure(
        &self,
        attempts: u32,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        if attempts >= max_attempts {
            return RetryDecision::Exhausted;
        }
        let attempts = attempts + 1;
        RetryDecision::Retry {
            attempts,
            scheduled_for: now + to_time_delta(self.backoff(attempts)),
        }
    }
}

/// Converts a std duration to a chrono delta, saturating at [`MAX_BACKOFF`].
///
/// Claim leases go through here too, so a lease longer than a day is
/// shortened to one.
pub fn to_time_delta(duration: Duration) -> TimeDelta {
    let ceiling = TimeDelta::seconds(MAX_BACKOFF.as_secs() as i64);
    TimeDelta::from_std(duration)
        .unwrap_or(ceiling)
        .min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn default_policy_matches_documented_constants() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(60));
        assert_eq!(policy.max_delay, Duration::from_secs(3600));
    }

    #[test]
    fn backoff_doubles_until_ceiling() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(60));
        assert_eq!(policy.backoff(1), Duration::from_secs(120));
        assert_eq!(policy.backoff(4), Duration::from_secs(960));
        assert_eq!(policy.backoff(5), Duration::from_secs(1920));
        assert_eq!(policy.backoff(6), Duration::from_secs(3600));
        assert_eq!(policy.backoff(200), Duration::from_secs(3600));
    }

    #[test]
    fn fourth_failure_reschedules_then_fifth_exhausts() {
        let policy = RetryPolicy::default();
        match policy.on_transient_failure(4, 5, now()) {
            RetryDecision::Retry {
                attempts,
                scheduled_for,
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(scheduled_for, now() + TimeDelta::seconds(1920));
            }
            RetryDecision::Exhausted => panic!("attempt 4 of 5 should be retried"),
        }
        assert_eq!(
            policy.on_transient_failure(5, 5, now()),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn zero_budget_exhausts_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.on_transient_failure(0, 0, now()),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn oversized_ceiling_is_clamped_to_one_day() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(7 * 86_400),
        };
        assert_eq!(policy.ceiling(), MAX_BACKOFF);
        assert_eq!(policy.backoff(10), MAX_BACKOFF);
        match policy.on_transient_failure(9, 10, now()) {
            RetryDecision::Retry { scheduled_for, .. } => {
                assert_eq!(scheduled_for, now() + TimeDelta::days(1));
            }
            RetryDecision::Exhausted => panic!("budget remains"),
        }
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_bounded(base in 1u64..600, cap in 1u64..86_400, attempt in 0u32..64) {
            let policy = RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_secs(base),
                max_delay: Duration::from_secs(cap),
            };
            prop_assert!(policy.backoff(attempt) <= policy.backoff(attempt + 1));
            prop_assert!(policy.backoff(attempt) <= policy.max_delay);
        }

        #[test]
        fn attempts_never_exceed_budget(max in 0u32..10, failures in 0usize..30) {
            let policy = RetryPolicy::default();
            let mut attempts = 0;
            for _ in 0..failures {
                match policy.on_transient_failure(attempts, max, now()) {
                    RetryDecision::Retry { attempts: next, .. } => attempts = next,
                    RetryDecision::Exhausted => break,
                }
            }
            prop_assert!(attempts <= max);
        }
    }
}
