/// Deadline model
///
/// Deadlines carry two reminder flags, one per notification threshold
/// (24 hours and 1 hour before the due time). The flags are independent and
/// monotonic: once a threshold's reminder is delivered, the flag is set and
/// never reverts, which is what makes delivery at-most-once per threshold.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE deadlines (
///     id UUID PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title TEXT NOT NULL,
///     due_at TIMESTAMPTZ NOT NULL,
///     reminded_24h BOOLEAN NOT NULL DEFAULT FALSE,
///     reminded_1h BOOLEAN NOT NULL DEFAULT FALSE
/// );
/// ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserId;

/// Deadline row id
pub type DeadlineId = Uuid;

/// Deadline row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deadline {
    pub id: DeadlineId,

    /// Owner of the deadline
    pub user_id: UserId,

    /// Short human-readable description
    pub title: String,

    /// When the deadline falls due
    pub due_at: DateTime<Utc>,

    /// 24-hour-window reminder delivered
    pub reminded_24h: bool,

    /// 1-hour-window reminder delivered
    pub reminded_1h: bool,
}

/// Input for creating a new deadline
#[derive(Debug, Clone)]
pub struct NewDeadline {
    pub user_id: UserId,
    pub title: String,
    pub due_at: DateTime<Utc>,
}

impl Deadline {
    /// Both thresholds have fired; the scheduler no longer needs this row
    pub fn is_fully_reminded(&self) -> bool {
        self.reminded_24h && self.reminded_1h
    }
}
