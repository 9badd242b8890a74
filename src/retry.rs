use std::time::Duration;

use reqwest::header::HeaderValue;

/// Where a retry delay came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DelaySource {
    /// The service's `Retry-After` header.
    RetryAfter,
    /// `2^(attempt + 1)` seconds.
    ExponentialBackoff,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryDelay {
    pub duration: Duration,
    pub source: DelaySource,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    Wait(RetryDelay),
    GiveUp,
}

/// Retry policy for responses rejected by service protection limits.
///
/// Pure and deterministic: the same attempt and header always yield the same
/// decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed for a rate-limited request.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Decides what to do after the 0-based `attempt` got HTTP 429.
    pub fn decide(&self, attempt: u32, retry_after: Option<&HeaderValue>) -> RetryDecision {
        let next = attempt.saturating_add(1);
        if next >= self.max_retries {
            return RetryDecision::GiveUp;
        }

        let delay = match retry_after.and_then(parse_retry_after) {
            Some(seconds) => RetryDelay {
                duration: Duration::from_secs(seconds),
                source: DelaySource::RetryAfter,
            },
            None => RetryDelay {
                duration: Duration::from_secs(1u64 << next.min(32)),
                source: DelaySource::ExponentialBackoff,
            },
        };
        RetryDecision::Wait(delay)
    }
}

/// Parses `Retry-After` as whole seconds. HTTP-date values and anything
/// else unparseable yield `None`.
pub(crate) fn parse_retry_after(value: &HeaderValue) -> Option<u64> {
    value.to_str().ok()?.trim().parse::<u64>().ok()
}
