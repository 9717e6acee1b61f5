//! Connect retry policy.
//!
//! The policy only covers establishing the connection. Send and receive
//! failures are never retried.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tcp_helper::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(200));
//! assert!(matches!(
//!     policy.decide(0, tcp_helper::Error::NotConnected),
//!     RetryDecision::Retry(_)
//! ));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Default number of retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// RetryDecision
// ============================================================================

/// What to do after a failed connect attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Wait for the delay, then try again.
    Retry(Duration),
    /// Stop and report the error.
    GiveUp(Error),
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Connect-failure recovery rule.
///
/// `max_attempts` counts the retries after the first attempt, so an
/// unreachable endpoint sees `max_attempts + 1` connects in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Whether failed connects are retried.
    pub enabled: bool,

    /// Maximum number of retries.
    pub max_attempts: u32,

    /// Delay between two attempts.
    #[serde(rename = "interval_ms", with = "crate::duration_ms")]
    pub interval: Duration,
}

impl RetryPolicy {
    /// Creates an enabled policy.
    #[inline]
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            enabled: true,
            max_attempts,
            interval,
        }
    }

    /// Creates a disabled policy.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Decides whether to retry after `retried` retries have already failed.
    #[must_use]
    pub fn decide(&self, retried: u32, error: Error) -> RetryDecision {
        if self.enabled && retried < self.max_attempts {
            RetryDecision::Retry(self.interval)
        } else {
            RetryDecision::GiveUp(error)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert!(!policy.enabled);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_disabled_gives_up_immediately() {
        let decision = RetryPolicy::disabled().decide(0, Error::NotConnected);
        assert!(matches!(decision, RetryDecision::GiveUp(Error::NotConnected)));
    }

    #[test]
    fn test_retries_until_max() {
        let policy = RetryPolicy::new(3, Duration::from_millis(200));

        for retried in 0..3 {
            match policy.decide(retried, Error::NotConnected) {
                RetryDecision::Retry(delay) => assert_eq!(delay, Duration::from_millis(200)),
                RetryDecision::GiveUp(e) => panic!("gave up early at {retried}: {e}"),
            }
        }
        assert!(matches!(
            policy.decide(3, Error::NotConnected),
            RetryDecision::GiveUp(_)
        ));
    }

    #[test]
    fn test_zero_attempts_never_retries() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert!(matches!(
            policy.decide(0, Error::NotConnected),
            RetryDecision::GiveUp(_)
        ));
    }

    #[test]
    fn test_from_json() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"enabled":true,"max_attempts":3,"interval_ms":200}"#)
                .expect("valid json");
        assert_eq!(policy, RetryPolicy::new(3, Duration::from_millis(200)));
    }
}
