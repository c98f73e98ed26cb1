//! # Bounded Retry
//!
//! Exponential backoff with jitter for the transient classes of failures
//! the pipeline meets: network resets, timeouts, 429s, 5xx. The policy is
//! explicit about attempt counts; anything the predicate does not classify
//! as transient fails on the spot.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// The retry policy: attempt bound, delay curve, and jitter fraction.
///
/// The delay before retry `i` (1-based) is
/// `min(max_delay, base_delay * multiplier^(i-1)) * (1 ± jitter)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// The jittered delay to sleep after a failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential =
            self.base_delay.as_secs_f64() * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());
        let factor = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter)
        } else {
            1.0
        };
        Duration::from_secs_f64((capped * factor).max(0.0))
    }
}

/// Runs `op` until it succeeds, the predicate rejects the error, or the
/// attempt budget is spent. The final error is returned unchanged.
/// Cancellation propagates immediately: dropping the returned future stops
/// both the operation and any pending backoff sleep.
pub async fn retry<T, E, Op, Fut, Pred>(
    policy: &RetryPolicy,
    is_transient: Pred,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Pred: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_transient(&err) => {
                let delay = policy.delay_for_attempt(attempt);
                debug!(attempt, ?delay, "transient failure, backing off: {err}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
