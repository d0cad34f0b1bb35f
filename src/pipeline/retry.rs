use std::{fmt::Display, future::Future, time::Duration};

use tracing::{debug, warn};

/// Fixed-count, fixed-delay retry. There is no backoff growth and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const CHAT: RetryPolicy = RetryPolicy::fixed(3, Duration::from_secs(2));
    pub const PLACES: RetryPolicy = RetryPolicy::fixed(2, Duration::from_secs(1));
    pub const IMAGES: RetryPolicy = RetryPolicy::fixed(2, Duration::from_secs(1));
    pub const WEB_SEARCH: RetryPolicy = RetryPolicy::fixed(3, Duration::from_secs(2));

    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Same attempt count, delay replaced when an override is configured.
    pub fn with_delay_override(self, delay: Option<Duration>) -> Self {
        match delay {
            Some(delay) => Self { delay, ..self },
            None => self,
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success { data: T, attempts: u32 },
    Failure { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Failure { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Runs `op` until it succeeds or `policy.max_attempts` calls have been made.
/// The last error is returned inside the outcome; this never propagates.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(data) => {
                if attempt > 1 {
                    debug!(label, attempt, "succeeded after retry");
                }
                return RetryOutcome::Success {
                    data,
                    attempts: attempt,
                };
            }
            Err(error) if attempt >= max => {
                warn!(label, attempt, error = %error, "giving up after {max} attempts");
                return RetryOutcome::Failure {
                    error,
                    attempts: attempt,
                };
            }
            Err(error) => {
                warn!(label, attempt, error = %error, "retry {attempt}/{max} after {:?}", policy.delay);
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}
