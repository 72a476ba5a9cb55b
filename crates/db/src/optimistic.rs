//! Optimistic-lock retry loop.
//!
//! An attempt reads a versioned record, decides, and issues a conditional
//! write. When the write loses a race the attempt reports `Conflict` and the
//! loop sleeps `base_delay × attempt + jitter` before trying again.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::DbError;

/// Tunable parameters for [`retry_optimistic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Grows linearly with the attempt number.
    pub base_delay: Duration,
    /// Upper bound of the random delay added on top.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_jitter: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Defaults overridden by `CHATFLOW_SLOT_MAX_ATTEMPTS` and
    /// `CHATFLOW_SLOT_BASE_DELAY_MS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Some(n) = env_parse::<u32>("CHATFLOW_SLOT_MAX_ATTEMPTS").filter(|n| *n > 0) {
            policy.max_attempts = n;
        }
        if let Some(ms) = env_parse::<u64>("CHATFLOW_SLOT_BASE_DELAY_MS") {
            policy.base_delay = Duration::from_millis(ms);
            policy.max_jitter = Duration::from_millis(ms);
        }
        policy
    }

    /// Delay before attempt `attempt + 1`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_delay.saturating_mul(attempt) + Duration::from_millis(jitter)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// What a single read-check-write attempt concluded.
#[derive(Debug, PartialEq)]
pub enum Attempt<T> {
    /// The conditional write succeeded.
    Commit(T),
    /// The precondition does not hold; retrying will not help.
    Abort,
    /// A concurrent writer changed the version; try again.
    Conflict,
}

/// Final result of [`retry_optimistic`].
#[derive(Debug, PartialEq)]
pub enum Outcome<T> {
    Committed(T),
    Aborted,
    /// Every attempt hit a conflict.
    Exhausted,
}

/// Run `attempt` until it commits, aborts, or `policy.max_attempts` is
/// reached. `attempt` receives the 1-based attempt number. Repository errors
/// stop the loop immediately.
pub async fn retry_optimistic<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<Outcome<T>, DbError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, DbError>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for n in 1..=max_attempts {
        match attempt(n).await? {
            Attempt::Commit(value) => return Ok(Outcome::Committed(value)),
            Attempt::Abort => return Ok(Outcome::Aborted),
            Attempt::Conflict if n < max_attempts => {
                let delay = policy.delay_after(n);
                debug!(
                    attempt = n,
                    delay_ms = delay.as_millis() as u64,
                    "optimistic write lost a race, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Attempt::Conflict => {}
        }
    }

    Ok(Outcome::Exhausted)
}
