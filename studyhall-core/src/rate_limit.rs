/// Per-feature daily rate limiting
///
/// Usage is counted per (user, feature, calendar day) in a dedicated
/// counter store. Scoping by day means every day starts from a fresh
/// counter without any reset job; the worker's janitor prunes old days so
/// the keyspace stays bounded.
///
/// # Check-then-act
///
/// `check` and `increment` are two separate storage calls: the caller
/// checks, performs the gated action, and only then records the use, so a
/// failed action never burns quota. Two concurrent requests from one user
/// can both pass the same check and briefly push the counter past the
/// limit. That gap is accepted for this workload (one human, one chat
/// session) and noted here rather than papered over.
use std::sync::Arc;

use crate::clock::Clock;
use crate::models::user::UserId;
use crate::storage::{Storage, StorageError};

/// Result of a rate-limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    /// Whether the action may proceed
    pub allowed: bool,

    /// Uses left today after this decision (0 when denied)
    pub remaining: i64,
}

impl RateLimitDecision {
    /// Decision allowing the action with `remaining` uses left
    pub fn allowed(remaining: i64) -> Self {
        RateLimitDecision {
            allowed: true,
            remaining,
        }
    }

    /// Decision denying the action
    pub fn denied() -> Self {
        RateLimitDecision {
            allowed: false,
            remaining: 0,
        }
    }
}

/// Daily usage gate
#[derive(Clone)]
pub struct RateLimiter {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates the limiter over the given storage and clock
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        RateLimiter { storage, clock }
    }

    /// Checks today's counter against `daily_limit`
    ///
    /// The calendar day comes from the configured deployment offset, so the
    /// counter rolls over at the audience's midnight.
    pub async fn check(
        &self,
        user_id: UserId,
        feature: &str,
        daily_limit: i64,
    ) -> Result<RateLimitDecision, StorageError> {
        let day = self.clock.today();
        let count = self.storage.usage_count(user_id, feature, day).await?;

        if count >= daily_limit {
            tracing::debug!(user_id, feature, count, daily_limit, "Daily limit reached");
            return Ok(RateLimitDecision::denied());
        }
        Ok(RateLimitDecision::allowed(daily_limit - count - 1))
    }

    /// Records one use of the feature; returns the new count
    ///
    /// Called after the gated action succeeded.
    pub async fn increment(&self, user_id: UserId, feature: &str) -> Result<i64, StorageError> {
        let day = self.clock.today();
        self.storage.increment_usage(user_id, feature, day).await
    }
}
