/// Usage counter model
///
/// Counters track how many times a user exercised a rate-limited feature on
/// a given calendar day. Rows are created lazily on first use and keyed by
/// an explicit (user, feature, day) tuple, so a new day implicitly starts
/// from a fresh counter and old days can be pruned by date.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE usage_counters (
///     user_id BIGINT NOT NULL,
///     feature TEXT NOT NULL,
///     day DATE NOT NULL,
///     count BIGINT NOT NULL DEFAULT 0,
///     PRIMARY KEY (user_id, feature, day)
/// );
/// ```
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::user::UserId;

/// Usage counter row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageCounter {
    /// User exercising the feature
    pub user_id: UserId,

    /// Feature key, e.g. "tutor" or "essay"
    pub feature: String,

    /// Calendar day in the configured deployment timezone
    pub day: NaiveDate,

    /// Uses recorded so far that day
    pub count: i64,
}
