/// Premium entitlement store
///
/// Owns the premium flag and expiry on user rows. Nothing else in the
/// system writes those fields: referral trials, referral rewards, and
/// payment approvals all funnel through the one stacking rule here.
///
/// # Stacking
///
/// An extension always adds days to the later of "now" and the current
/// expiry. A renewal before expiry keeps the unused remainder; a renewal
/// after expiry starts fresh from now instead of swallowing the gap:
///
/// ```text
/// until = max(current_until, now) + days
/// ```
///
/// Every extension also clears the expiry-reminder flag, so a fresh
/// reminder can fire near the new boundary.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use studyhall_core::clock::SystemClock;
/// use studyhall_core::entitlement::EntitlementStore;
/// use studyhall_core::storage::MemoryStorage;
///
/// # async fn example() -> Result<(), studyhall_core::error::CoreError> {
/// let storage = Arc::new(MemoryStorage::new());
/// let clock = Arc::new(SystemClock::new("+05:00".parse().unwrap()));
/// let entitlements = EntitlementStore::new(storage, clock);
///
/// entitlements.grant_or_extend(42, 30).await?;
/// assert!(entitlements.is_currently_entitled(42).await?);
/// # Ok(())
/// # }
/// ```
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::user::{User, UserId};
use crate::storage::{Storage, StorageError};

/// Applies the stacking rule to a user row.
///
/// Pure so it can run inside any atomic storage update: a direct grant, a
/// referral reward, or a payment approval sharing its transaction with the
/// status transition.
pub fn extend_premium(user: &mut User, days: i64, now: DateTime<Utc>) {
    let base = match user.premium_until {
        Some(until) if until > now => until,
        _ => now,
    };
    user.premium = true;
    user.premium_until = Some(base + Duration::days(days));
    user.premium_reminded = false;
}

/// Premium entitlement component
#[derive(Clone)]
pub struct EntitlementStore {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl EntitlementStore {
    /// Creates the store over the given storage and clock
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        EntitlementStore { storage, clock }
    }

    /// Whether the user holds effective premium right now
    ///
    /// The derived check `flag && until > now` is the single source of
    /// truth for feature gating; nothing synchronously clears the flag at
    /// the exact expiry instant. An unknown user is simply not entitled.
    pub async fn is_currently_entitled(&self, user_id: UserId) -> Result<bool, StorageError> {
        let now = self.clock.now();
        Ok(self
            .storage
            .fetch_user(user_id)
            .await?
            .is_some_and(|user| user.is_entitled_at(now)))
    }

    /// Grants premium or extends it by `days`, stacking on unused time
    ///
    /// Runs as one atomic read-modify-write on the user row, so two grants
    /// racing (payment approval and referral reward at the same instant)
    /// are both reflected.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UserNotFound`] for an unknown user.
    pub async fn grant_or_extend(&self, user_id: UserId, days: i64) -> CoreResult<User> {
        let now = self.clock.now();
        let apply = move |user: &mut User| extend_premium(user, days, now);

        let user = self
            .storage
            .update_user(user_id, &apply)
            .await?
            .ok_or(CoreError::UserNotFound(user_id))?;

        tracing::info!(
            user_id,
            days,
            premium_until = ?user.premium_until,
            "Premium granted or extended"
        );
        Ok(user)
    }

    /// Revokes premium immediately; admin-only, idempotent
    pub async fn revoke(&self, user_id: UserId) -> CoreResult<User> {
        let now = self.clock.now();
        let apply = move |user: &mut User| {
            user.premium = false;
            user.premium_until = Some(now);
        };

        let user = self
            .storage
            .update_user(user_id, &apply)
            .await?
            .ok_or(CoreError::UserNotFound(user_id))?;

        tracing::info!(user_id, "Premium revoked");
        Ok(user)
    }
}
