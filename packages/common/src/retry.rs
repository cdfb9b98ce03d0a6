use chrono::Duration;

/// Exponent ceiling for [`backoff`]; keeps the delay representable.
const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Outcome of a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the event. `attempt` is the new attempt count.
    Retry { attempt: i32, delay: Duration },
    /// The retry budget is spent; the event goes to the dead letter state.
    Exhausted { attempt: i32 },
}

/// Decide what happens after a failure, given the attempts made *before* it.
///
/// The failing attempt is counted here, so `attempts + 1` is compared against the ceiling.
pub fn decide(attempts: i32, max_attempts: i32) -> RetryDecision {
    let attempt = attempts.saturating_add(1);
    if attempt >= max_attempts {
        RetryDecision::Exhausted { attempt }
    } else {
        RetryDecision::Retry {
            attempt,
            delay: backoff(attempt as u32),
        }
    }
}

/// Exponential backoff: `2^attempt` minutes.
///
/// Attempt 1 waits 2 minutes, attempt 2 waits 4, attempt 3 waits 8.
pub fn backoff(attempt: u32) -> Duration {
    let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
    Duration::minutes(1i64 << exponent)
}
