//! Retry classification for completed fetches.
//!
//! This layer only says whether a response is worth another attempt. It
//! never sleeps or re-issues anything; callers that decide to retry issue
//! a new fetch tagged [`QueryType::Retry`].

use sitegrab_core::QueryType;

use crate::transport::SiteResponse;

/// What a caller should do with a completed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// The response is usable.
    Done,
    /// A transient failure; another attempt may succeed.
    Retry,
    /// A permanent failure.
    Fail,
}

impl RetryClass {
    /// Classifies a response.
    ///
    /// Connection errors, timeouts, 429 and 5xx are transient. Everything
    /// else that is not a 2xx/3xx answer is permanent.
    pub fn of(response: &SiteResponse) -> Self {
        if let Some(error) = &response.error {
            return if error.is_transient() { Self::Retry } else { Self::Fail };
        }
        match response.status {
            Some(200..=399) => Self::Done,
            Some(429 | 500..=599) => Self::Retry,
            _ => Self::Fail,
        }
    }
}

/// Bounds how many attempts a caller makes for one resource.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }

    /// Returns true if attempt number `attempt` (1-based) should be
    /// followed by another one.
    pub fn should_retry(&self, attempt: u32, response: &SiteResponse) -> bool {
        attempt < self.max_attempts && RetryClass::of(response) == RetryClass::Retry
    }

    /// Query type for the next attempt.
    pub fn retry_query_type(&self) -> QueryType {
        QueryType::Retry
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
