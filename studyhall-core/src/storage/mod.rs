/// Storage abstraction
///
/// Every component receives a `dyn Storage` instead of holding a database
/// pool of its own, so the same entitlement, referral, payment, and
/// rate-limit logic runs against PostgreSQL in production and against the
/// in-memory implementation in tests.
///
/// # Atomicity
///
/// The closure-based `update_*` methods are the contract's heart: each runs
/// as one atomic read-modify-write scoped to the touched row(s). Two
/// concurrent `grant_or_extend` calls on one user (a payment approval and
/// a referral reward landing at the same instant) must both be reflected
/// in the final expiry; a lost update here silently erases purchased days.
/// `update_payment_with_user` extends the same guarantee across a payment
/// row and its owner so a guarded status transition and the resulting
/// entitlement grant commit together.
///
/// Usage-counter increments are atomic per call, but the rate limiter's
/// check-then-act across two calls is not; that gap is documented at the
/// rate limiter.
pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::error::CoreError;
use crate::models::deadline::{Deadline, DeadlineId, NewDeadline};
use crate::models::payment::{NewPayment, PaymentId, PaymentRequest};
use crate::models::user::{NewUser, User, UserId};

/// Storage failure
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend unreachable or misconfigured
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// In-place mutation applied under a single-row lock
pub type UserUpdate<'a> = &'a (dyn Fn(&mut User) + Send + Sync);

/// In-place mutation applied under a single-row lock
pub type DeadlineUpdate<'a> = &'a (dyn Fn(&mut Deadline) + Send + Sync);

/// Fallible mutation of a payment and its owner under one lock scope
///
/// Returning an error rolls the whole operation back; nothing is written.
pub type PaymentWithUserUpdate<'a> =
    &'a (dyn Fn(&mut PaymentRequest, &mut User) -> Result<(), CoreError> + Send + Sync);

/// Row-level atomic storage for users, deadlines, payments, and usage counters
#[async_trait]
pub trait Storage: Send + Sync {
    // --- users ---

    /// Fetches a user by id
    async fn fetch_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Inserts the user unless the id is already known
    ///
    /// Returns true when a row was created. First-seen-only: an existing
    /// row is left untouched.
    async fn create_user_if_absent(&self, user: NewUser) -> Result<bool, StorageError>;

    /// Applies `apply` to the user row as one atomic read-modify-write
    ///
    /// Returns the updated row, or None for an unknown id.
    async fn update_user(
        &self,
        id: UserId,
        apply: UserUpdate<'_>,
    ) -> Result<Option<User>, StorageError>;

    /// Users whose premium flag is set, expiry is present, and expiry
    /// reminder has not been delivered
    ///
    /// The scheduler applies the 24-hour window itself; this is only the
    /// coarse candidate scan.
    async fn expiry_reminder_candidates(&self) -> Result<Vec<User>, StorageError>;

    /// Total number of known users
    async fn count_users(&self) -> Result<i64, StorageError>;

    /// Users whose derived entitlement is active at `now`
    async fn count_entitled(&self, now: DateTime<Utc>) -> Result<i64, StorageError>;

    /// Users first seen at or after `since`
    async fn count_signups_since(&self, since: DateTime<Utc>) -> Result<i64, StorageError>;

    // --- deadlines ---

    /// Creates a deadline and returns the stored row
    async fn create_deadline(&self, deadline: NewDeadline) -> Result<Deadline, StorageError>;

    /// Deadlines still due after `now` with at least one reminder pending
    async fn open_deadlines(&self, now: DateTime<Utc>) -> Result<Vec<Deadline>, StorageError>;

    /// A user's deadlines due after `now`, soonest first
    async fn upcoming_deadlines(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Deadline>, StorageError>;

    /// Applies `apply` to the deadline row as one atomic read-modify-write
    async fn update_deadline(
        &self,
        id: DeadlineId,
        apply: DeadlineUpdate<'_>,
    ) -> Result<Option<Deadline>, StorageError>;

    /// Deletes a deadline; returns false for an unknown id
    async fn delete_deadline(&self, id: DeadlineId) -> Result<bool, StorageError>;

    // --- payments ---

    /// Records a submitted payment request and returns the stored row
    async fn create_payment(
        &self,
        payment: NewPayment,
        created_at: DateTime<Utc>,
    ) -> Result<PaymentRequest, StorageError>;

    /// Fetches a payment by id
    async fn fetch_payment(&self, id: PaymentId) -> Result<Option<PaymentRequest>, StorageError>;

    /// Payments awaiting a decision, oldest first
    async fn pending_payments(&self) -> Result<Vec<PaymentRequest>, StorageError>;

    /// Applies `apply` to a payment and its owner inside one atomic scope
    ///
    /// The guarded status transition and the entitlement grant both happen
    /// in `apply`; an `Err` from the closure aborts the operation with
    /// nothing written.
    async fn update_payment_with_user(
        &self,
        id: PaymentId,
        apply: PaymentWithUserUpdate<'_>,
    ) -> Result<(PaymentRequest, User), CoreError>;

    // --- usage counters ---

    /// Current count for (user, feature, day); 0 when no row exists
    async fn usage_count(
        &self,
        user_id: UserId,
        feature: &str,
        day: NaiveDate,
    ) -> Result<i64, StorageError>;

    /// Adds 1 to the counter, creating the row lazily; returns the new count
    async fn increment_usage(
        &self,
        user_id: UserId,
        feature: &str,
        day: NaiveDate,
    ) -> Result<i64, StorageError>;

    /// Removes counters for days strictly before `cutoff`; returns rows removed
    async fn prune_usage_before(&self, cutoff: NaiveDate) -> Result<u64, StorageError>;
}
