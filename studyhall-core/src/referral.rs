/// Referral engine
///
/// Centralizes the signup trial and the referral reward rule so both are
/// defined once and independently testable, instead of being scattered
/// through message handlers.
///
/// # Reward rule
///
/// Each successful referral increments the referrer's counter by exactly 1.
/// When the new total is a positive multiple of `reward_every`, the
/// referrer receives `reward_days` of premium. Because the counter moves in
/// steps of 1 and never decreases, every multiple is visited exactly once;
/// the counter's own monotonicity is the only bookkeeping needed.
use std::sync::Arc;

use crate::clock::Clock;
use crate::entitlement::EntitlementStore;
use crate::error::{CoreError, CoreResult};
use crate::models::user::{NewUser, User, UserId};
use crate::notifier::Notifier;
use crate::storage::{Storage, StorageError};

/// Referral and trial policy
#[derive(Debug, Clone, Copy)]
pub struct ReferralPolicy {
    /// Days of premium granted to every first-seen signup
    pub trial_days: i64,

    /// Referral count step that triggers a reward
    pub reward_every: i64,

    /// Days of premium granted at each reward crossing
    pub reward_days: i64,
}

impl Default for ReferralPolicy {
    fn default() -> Self {
        ReferralPolicy {
            trial_days: 2,
            reward_every: 10,
            reward_days: 30,
        }
    }
}

/// What a signup did
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    /// Whether a new user row was created (first-seen only)
    pub created: bool,

    /// Referrer crediting result, when a valid referrer was attached
    pub referral: Option<ReferralOutcome>,
}

/// Result of crediting one successful referral
#[derive(Debug, Clone, Copy)]
pub struct ReferralOutcome {
    pub referrer_id: UserId,

    /// The referrer's new total
    pub total: i64,

    /// Whether this credit crossed a reward threshold
    pub rewarded: bool,
}

/// Progress toward the next reward, for the foreground referral screen
#[derive(Debug, Clone, Copy)]
pub struct ReferralProgress {
    pub count: i64,
    pub next_target: i64,
    pub remaining: i64,
}

/// Signup details handed in by the foreground
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub user_id: UserId,
    pub referrer_id: Option<UserId>,
    pub full_name: Option<String>,
    pub handle: Option<String>,
    pub source: Option<String>,
}

/// Referral component
#[derive(Clone)]
pub struct ReferralEngine {
    storage: Arc<dyn Storage>,
    entitlements: EntitlementStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: ReferralPolicy,
}

impl ReferralEngine {
    /// Creates the engine with the default policy
    pub fn new(
        storage: Arc<dyn Storage>,
        entitlements: EntitlementStore,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_policy(storage, entitlements, notifier, clock, ReferralPolicy::default())
    }

    /// Creates the engine with a custom policy
    pub fn with_policy(
        storage: Arc<dyn Storage>,
        entitlements: EntitlementStore,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: ReferralPolicy,
    ) -> Self {
        ReferralEngine {
            storage,
            entitlements,
            notifier,
            clock,
            policy,
        }
    }

    /// Registers a signup: first-seen creation, trial grant, referrer credit
    ///
    /// - The user row is created only if absent; a returning user just gets
    ///   name and handle refreshed and nothing else happens.
    /// - A self-referral is rejected silently (stored and credited as no
    ///   referrer at all).
    /// - A first-seen signup receives the trial via the entitlement store
    ///   and, when a valid referrer is attached, credits that referrer.
    pub async fn register_signup(&self, signup: SignupRequest) -> CoreResult<SignupOutcome> {
        let referrer_id = signup
            .referrer_id
            .filter(|referrer| *referrer != signup.user_id);

        let created = self
            .storage
            .create_user_if_absent(NewUser {
                id: signup.user_id,
                full_name: signup.full_name.clone(),
                handle: signup.handle.clone(),
                referrer_id,
                signup_source: signup.source.clone(),
                created_at: self.clock.now(),
            })
            .await?;

        if !created {
            let full_name = signup.full_name.clone();
            let handle = signup.handle.clone();
            let apply = move |user: &mut User| {
                user.full_name = full_name.clone();
                user.handle = handle.clone();
            };
            self.storage.update_user(signup.user_id, &apply).await?;
            return Ok(SignupOutcome {
                created: false,
                referral: None,
            });
        }

        self.entitlements
            .grant_or_extend(signup.user_id, self.policy.trial_days)
            .await?;
        tracing::info!(user_id = signup.user_id, "New signup, trial granted");

        let referral = match referrer_id {
            Some(referrer) => match self.on_successful_referral(referrer).await {
                Ok(outcome) => Some(outcome),
                // A dangling referrer id in a signup link is the referrer's
                // problem, never the new user's.
                Err(CoreError::UserNotFound(_)) => {
                    tracing::debug!(referrer, "Ignoring unknown referrer");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(SignupOutcome { created: true, referral })
    }

    /// Credits one successful referral and applies the reward rule
    ///
    /// Returns the referrer's new total. On a reward crossing the referrer
    /// is granted premium and told so; otherwise they get a progress note.
    /// Either notification may fail without affecting the credit.
    pub async fn on_successful_referral(&self, referrer_id: UserId) -> CoreResult<ReferralOutcome> {
        let apply = |user: &mut User| user.referral_count += 1;
        let referrer = self
            .storage
            .update_user(referrer_id, &apply)
            .await?
            .ok_or(CoreError::UserNotFound(referrer_id))?;

        let total = referrer.referral_count;
        let rewarded = total > 0 && total % self.policy.reward_every == 0;

        let message = if rewarded {
            self.entitlements
                .grant_or_extend(referrer_id, self.policy.reward_days)
                .await?;
            tracing::info!(referrer_id, total, "Referral reward granted");
            format!(
                "Congratulations! You invited your referral #{total} and earned {} days of premium.",
                self.policy.reward_days
            )
        } else {
            let remaining = self.policy.reward_every - (total % self.policy.reward_every);
            format!(
                "A new user joined through your link! Total invites: {total}. \
                 {remaining} more until your next reward."
            )
        };

        if let Err(e) = self.notifier.send(referrer_id, &message).await {
            tracing::warn!(referrer_id, error = %e, "Referral notification not delivered");
        }

        Ok(ReferralOutcome {
            referrer_id,
            total,
            rewarded,
        })
    }

    /// Progress summary for the referral screen
    ///
    /// An unknown user reads as zero referrals rather than an error.
    pub async fn progress(&self, user_id: UserId) -> Result<ReferralProgress, StorageError> {
        let count = self
            .storage
            .fetch_user(user_id)
            .await?
            .map(|user| user.referral_count)
            .unwrap_or(0);

        let next_target = ((count / self.policy.reward_every) + 1) * self.policy.reward_every;
        Ok(ReferralProgress {
            count,
            next_target,
            remaining: next_target - count,
        })
    }
}
