use std::time::Duration;

use crate::{ApiStatus, FetchOutcome};

/// Per-entity retry budget and delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per entity, including the first one.
    pub max_retries: u32,
    /// 429 backoff grows linearly: `rate_limit_base * attempt`.
    pub rate_limit_base: Duration,
    /// Fixed pause after any other transient failure.
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            rate_limit_base: Duration::from_secs(2),
            transient_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The outcome is a definitive answer.
    Terminal,
    /// Sleep, then make attempt `attempt + 1`.
    RetryAfter(Duration),
    /// Transient failure on the last permitted attempt.
    GiveUp,
}

impl RetryPolicy {
    /// Decide what follows `outcome`, observed on 1-based attempt `attempt`.
    pub fn decide(&self, outcome: &FetchOutcome, attempt: u32) -> RetryDecision {
        if !outcome.is_transient() {
            return RetryDecision::Terminal;
        }
        if attempt >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        match outcome {
            FetchOutcome::RateLimited => RetryDecision::RetryAfter(self.rate_limit_base * attempt),
            _ => RetryDecision::RetryAfter(self.transient_delay),
        }
    }
}

/// Final result of the retry loop for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResolution {
    /// Outcome of the last attempt.
    pub outcome: FetchOutcome,
    pub attempts: u32,
    /// Retries ran out without a definitive answer.
    pub exhausted: bool,
}

impl FetchResolution {
    pub fn status(&self) -> ApiStatus {
        if self.exhausted {
            return ApiStatus::FailedAfterRetries;
        }
        match self.outcome {
            FetchOutcome::Success(_) => ApiStatus::Success,
            FetchOutcome::NoData => ApiStatus::NoData,
            FetchOutcome::NotFound => ApiStatus::NotFound,
            FetchOutcome::JsonError(_) => ApiStatus::JsonError,
            FetchOutcome::RateLimited
            | FetchOutcome::HttpError(_)
            | FetchOutcome::ConnectionError(_) => ApiStatus::FailedAfterRetries,
        }
    }
}
