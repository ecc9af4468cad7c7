use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Errors that may clear up if the same call is simply made again.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Bounded attempts, polled quickly at first and then more slowly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub fast_attempts: u32,
    #[serde(with = "millis")]
    pub fast_interval: Duration,
    #[serde(with = "millis")]
    pub slow_interval: Duration,
}

impl BackoffPolicy {
    /// Payment-session verification: 5 × 2 s, then 5 s, 10 attempts.
    pub fn verification() -> Self {
        Self {
            max_attempts: 10,
            fast_attempts: 5,
            fast_interval: Duration::from_secs(2),
            slow_interval: Duration::from_secs(5),
        }
    }

    /// Ticket issuance: 6 × 5 s, then 10 s, 20 attempts.
    pub fn ticketing() -> Self {
        Self {
            max_attempts: 20,
            fast_attempts: 6,
            fast_interval: Duration::from_secs(5),
            slow_interval: Duration::from_secs(10),
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            fast_attempts: 0,
            fast_interval: Duration::ZERO,
            slow_interval: Duration::ZERO,
        }
    }

    /// Wait after the given (1-based) attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt <= self.fast_attempts {
            self.fast_interval
        } else {
            self.slow_interval
        }
    }

    /// Upper bound on time spent sleeping across all attempts.
    pub fn total_wait(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.delay_after(a)).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error(transparent)]
    Fatal(E),
}

/// Calls `op` until it yields a value, fails permanently, or the policy
/// runs out of attempts.
///
/// `op` returns `Ok(None)` for "not ready yet". Transient errors count as
/// not ready. Dropping the returned future stops the loop.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Transient + Display,
{
    for attempt in 1..=policy.max_attempts {
        match op(attempt).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => debug!("{}: attempt {}/{} not ready", label, attempt, policy.max_attempts),
            Err(e) if e.is_transient() => {
                warn!("{}: attempt {}/{} failed: {}", label, attempt, policy.max_attempts, e)
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }

        if attempt < policy.max_attempts {
            sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
    })
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
