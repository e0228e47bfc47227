// src/retry.rs
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ErrorClass, Scope};

/// What the orchestrator should do after a failed retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    RetryAfter(Duration),
    FailFast,
    /// Drop the item (or, at resource level, yield an empty result) and move on.
    SkipItem,
    /// A retryable class ran out of attempts. Terminal, same as `FailFast`.
    Exhausted,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2_000
}
fn default_rate_limit_delay_ms() -> u64 {
    5_000
}
fn default_max_delay_ms() -> u64 {
    60_000
}

/// Fixed policy table mapping `(ErrorClass, attempt)` to a [`Decision`].
/// Only the delays and the attempt cap are tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    /// Upper bound for any single wait, computed or server-signalled.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay_ms = d.as_millis() as u64;
        self
    }

    pub fn with_rate_limit_delay(mut self, d: Duration) -> Self {
        self.rate_limit_delay_ms = d.as_millis() as u64;
        self
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn decide(&self, class: ErrorClass, attempt: u32) -> Decision {
        match class {
            ErrorClass::Transient | ErrorClass::RateLimited { .. }
                if attempt >= self.max_attempts =>
            {
                Decision::Exhausted
            }
            ErrorClass::Transient => Decision::RetryAfter(self.backoff(attempt)),
            ErrorClass::RateLimited { retry_after } => {
                let wait = retry_after
                    .unwrap_or(Duration::from_millis(self.rate_limit_delay_ms))
                    .min(self.max_delay());
                Decision::RetryAfter(wait)
            }
            ErrorClass::Unauthorized | ErrorClass::Malformed(Scope::Resource) => {
                Decision::FailFast
            }
            ErrorClass::Malformed(Scope::Item)
            | ErrorClass::NotFound
            | ErrorClass::StructureChanged => Decision::SkipItem,
        }
    }

    /// base × 2^(attempt-1), clamped to `max_delay_ms`.
    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let ms = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(ms).min(self.max_delay())
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_backoff_doubles_per_attempt() {
        let p = RetryPolicy::default().with_max_attempts(5);
        assert_eq!(
            p.decide(ErrorClass::Transient, 1),
            Decision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            p.decide(ErrorClass::Transient, 2),
            Decision::RetryAfter(Duration::from_secs(4))
        );
        assert_eq!(
            p.decide(ErrorClass::Transient, 4),
            Decision::RetryAfter(Duration::from_secs(16))
        );
        assert_eq!(p.decide(ErrorClass::Transient, 5), Decision::Exhausted);
    }

    #[test]
    fn backoff_is_clamped() {
        let p = RetryPolicy {
            max_attempts: 40,
            base_delay_ms: 1_000,
            rate_limit_delay_ms: 1_000,
            max_delay_ms: 10_000,
        };
        assert_eq!(
            p.decide(ErrorClass::Transient, 39),
            Decision::RetryAfter(Duration::from_secs(10))
        );
    }

    #[test]
    fn rate_limit_prefers_signalled_delay() {
        let p = RetryPolicy::default();
        let signalled = ErrorClass::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(
            p.decide(signalled, 1),
            Decision::RetryAfter(Duration::from_secs(7))
        );
        let unsignalled = ErrorClass::RateLimited { retry_after: None };
        assert_eq!(
            p.decide(unsignalled, 2),
            Decision::RetryAfter(Duration::from_secs(5))
        );
        let huge = ErrorClass::RateLimited {
            retry_after: Some(Duration::from_secs(3_600)),
        };
        assert_eq!(
            p.decide(huge, 1),
            Decision::RetryAfter(Duration::from_secs(60))
        );
    }

    #[test]
    fn skip_classes_never_retry() {
        let p = RetryPolicy::default();
        for class in [
            ErrorClass::NotFound,
            ErrorClass::StructureChanged,
            ErrorClass::Malformed(Scope::Item),
        ] {
            assert_eq!(p.decide(class, 1), Decision::SkipItem);
        }
    }

    #[test]
    fn fail_fast_classes_ignore_the_budget() {
        for max in [1, 3, 10] {
            let p = RetryPolicy::default().with_max_attempts(max);
            for class in [ErrorClass::Unauthorized, ErrorClass::Malformed(Scope::Resource)] {
                assert_eq!(p.decide(class, 1), Decision::FailFast, "{class} with max {max}");
            }
        }
    }

    #[test]
    fn single_attempt_budget_exhausts_immediately() {
        let p = RetryPolicy::default().with_max_attempts(1);
        assert_eq!(p.decide(ErrorClass::Transient, 1), Decision::Exhausted);
    }

    #[test]
    fn deserializes_partial_table() {
        let p: RetryPolicy = toml::from_str("max_attempts = 4").unwrap();
        assert_eq!(p.max_attempts, 4);
        assert_eq!(p.base_delay_ms, 2_000);
    }
}
