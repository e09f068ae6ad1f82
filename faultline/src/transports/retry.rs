use std::thread;
use std::time::Duration;

use faultline_core::{faultline_debug, DeliveryError};

/// How a response status is treated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusClass {
    /// The payload was accepted.
    Success,
    /// The request may succeed when repeated.
    Retry,
    /// The payload was refused and repeating won't help.
    Reject,
}

/// Classifies an HTTP response status.
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        408 | 429 => StatusClass::Retry,
        500..=599 => StatusClass::Retry,
        _ => StatusClass::Reject,
    }
}

/// A failed attempt.
#[derive(Debug)]
pub struct AttemptError {
    /// The error reported if this was the last attempt.
    pub error: DeliveryError,
    /// Whether another attempt may succeed.
    pub retryable: bool,
    /// The server asked to wait at least this long.
    pub retry_after: Option<Duration>,
}

impl AttemptError {
    /// An error worth retrying.
    pub fn retry(error: DeliveryError) -> AttemptError {
        AttemptError {
            error,
            retryable: true,
            retry_after: None,
        }
    }

    /// An error that ends the delivery.
    pub fn fatal(error: DeliveryError) -> AttemptError {
        AttemptError {
            error,
            retryable: false,
            retry_after: None,
        }
    }
}

/// Retries failed sends with exponential backoff.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use faultline::transports::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.backoff(1), Duration::from_millis(500));
/// assert_eq!(policy.backoff(2), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How many times a payload is sent at most.
    pub max_attempts: u32,
    /// The delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// The longest delay between attempts.  A server asking for a longer
    /// pause ends the delivery instead.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that sends every payload once.
    pub fn no_retries() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// The delay after the given failed attempt, counting from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Calls `attempt` until it succeeds, fails fatally or the attempts
    /// are used up.  With `debug` set every retry is logged.
    pub fn run<F>(&self, debug: bool, mut attempt: F) -> Result<(), DeliveryError>
    where
        F: FnMut(u32) -> Result<(), AttemptError>,
    {
        let mut n = 1;
        loop {
            let err = match attempt(n) {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if !err.retryable || n >= self.max_attempts {
                return Err(err.error);
            }
            let delay = self.backoff(n).max(err.retry_after.unwrap_or_default());
            if delay > self.max_backoff {
                faultline_debug!(
                    debug,
                    "Giving up after attempt {}: server asked to wait {}s",
                    n,
                    delay.as_secs()
                );
                return Err(err.error);
            }
            faultline_debug!(
                debug,
                "Attempt {} failed ({}), retrying in {}ms",
                n,
                err.error,
                delay.as_millis()
            );
            thread::sleep(delay);
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rstest::rstest;

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
        }
    }

    #[rstest]
    #[case(200, StatusClass::Success)]
    #[case(202, StatusClass::Success)]
    #[case(400, StatusClass::Reject)]
    #[case(401, StatusClass::Reject)]
    #[case(408, StatusClass::Retry)]
    #[case(413, StatusClass::Reject)]
    #[case(429, StatusClass::Retry)]
    #[case(500, StatusClass::Retry)]
    #[case(503, StatusClass::Retry)]
    fn test_classify_status(#[case] status: u16, #[case] expected: StatusClass) {
        assert_eq!(classify_status(status), expected);
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_secs(2));
        assert_eq!(policy.backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn test_retries_until_success() {
        let calls = Cell::new(0);
        let result = fast(3).run(false, |n| {
            calls.set(n);
            if n < 3 {
                Err(AttemptError::retry(DeliveryError::Rejected { status: 503 }))
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Ok(()));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result = fast(3).run(false, |n| {
            calls.set(n);
            Err(AttemptError::retry(DeliveryError::Transport("refused".into())))
        });
        assert_eq!(result, Err(DeliveryError::Transport("refused".into())));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_fatal_error_is_not_retried() {
        let calls = Cell::new(0);
        let result = fast(3).run(false, |n| {
            calls.set(n);
            Err(AttemptError::fatal(DeliveryError::Rejected { status: 400 }))
        });
        assert_eq!(result, Err(DeliveryError::Rejected { status: 400 }));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_long_retry_after_ends_delivery() {
        let calls = Cell::new(0);
        let result = fast(3).run(false, |n| {
            calls.set(n);
            Err(AttemptError {
                retry_after: Some(Duration::from_secs(3600)),
                ..AttemptError::retry(DeliveryError::Rejected { status: 429 })
            })
        });
        assert_eq!(result, Err(DeliveryError::Rejected { status: 429 }));
        assert_eq!(calls.get(), 1);
    }
}
