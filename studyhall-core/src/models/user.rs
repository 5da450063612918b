/// User model
///
/// Users are identified by the id the chat platform assigns them, so the
/// primary key is externally issued rather than minted here.
///
/// # Entitlement
///
/// A user's effective premium status is always derived from the flag *and*
/// the expiry timestamp together (see [`User::is_entitled_at`]). Nothing
/// clears the flag at the exact expiry instant, so the raw flag alone is
/// never trusted for feature gating.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGINT PRIMARY KEY,
///     full_name TEXT,
///     handle TEXT,
///     premium BOOLEAN NOT NULL DEFAULT FALSE,
///     premium_until TIMESTAMPTZ,
///     premium_reminded BOOLEAN NOT NULL DEFAULT FALSE,
///     referral_count BIGINT NOT NULL DEFAULT 0,
///     referrer_id BIGINT,
///     signup_source TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat-platform user id
pub type UserId = i64;

/// User row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Externally-issued chat-platform id
    pub id: UserId,

    /// Display name as last seen at signup
    pub full_name: Option<String>,

    /// Platform handle as last seen at signup
    pub handle: Option<String>,

    /// Premium flag; never authoritative on its own
    pub premium: bool,

    /// Premium expiry; None means the user never held premium
    pub premium_until: Option<DateTime<Utc>>,

    /// Whether the expiry reminder for the current period was delivered
    ///
    /// Reset to false by every extension so a fresh reminder can fire near
    /// the new boundary.
    pub premium_reminded: bool,

    /// Number of successful referrals credited to this user; monotonic
    pub referral_count: i64,

    /// Who referred this user (back-reference, not ownership)
    pub referrer_id: Option<UserId>,

    /// Acquisition tag recorded at signup (e.g. a campaign keyword)
    pub signup_source: Option<String>,

    /// When the account was first seen
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub full_name: Option<String>,
    pub handle: Option<String>,
    pub referrer_id: Option<UserId>,
    pub signup_source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Effective entitlement at the given instant: `premium && until > now`
    pub fn is_entitled_at(&self, now: DateTime<Utc>) -> bool {
        self.premium && self.premium_until.is_some_and(|until| until > now)
    }
}
