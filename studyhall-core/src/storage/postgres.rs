/// PostgreSQL storage
///
/// Runtime-checked sqlx queries over the schema in `migrations/`. The
/// closure-based updates open a transaction and lock the touched row(s)
/// with `SELECT ... FOR UPDATE` before applying the mutation, so concurrent
/// grants against one user serialize instead of losing updates.
/// `update_payment_with_user` locks the payment first and then its owner;
/// every caller goes through this method, so the lock order is uniform.
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::deadline::{Deadline, DeadlineId, NewDeadline};
use crate::models::payment::{NewPayment, PaymentId, PaymentRequest, PaymentStatus};
use crate::models::usage::UsageCounter;
use crate::models::user::{NewUser, User, UserId};
use crate::storage::{
    DeadlineUpdate, PaymentWithUserUpdate, Storage, StorageError, UserUpdate,
};

const USER_COLUMNS: &str = "id, full_name, handle, premium, premium_until, premium_reminded, \
                            referral_count, referrer_id, signup_source, created_at";

const DEADLINE_COLUMNS: &str = "id, user_id, title, due_at, reminded_24h, reminded_1h";

const PAYMENT_COLUMNS: &str =
    "id, user_id, amount_minor, proof_ref, comment, status, admin_note, created_at, decided_at";

/// PostgreSQL [`Storage`] implementation
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Creates storage over an existing pool
    pub fn new(pool: PgPool) -> Self {
        PgStorage { pool }
    }

    async fn lock_user(
        tx: &mut Transaction<'_, Postgres>,
        id: UserId,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    async fn persist_user(
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET full_name = $2, handle = $3, premium = $4, premium_until = $5,
                premium_reminded = $6, referral_count = $7, referrer_id = $8,
                signup_source = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.handle)
        .bind(user.premium)
        .bind(user.premium_until)
        .bind(user.premium_reminded)
        .bind(user.referral_count)
        .bind(user.referrer_id)
        .bind(&user.signup_source)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn fetch_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user_if_absent(&self, user: NewUser) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, full_name, handle, referrer_id, signup_source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.handle)
        .bind(user.referrer_id)
        .bind(&user.signup_source)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_user(
        &self,
        id: UserId,
        apply: UserUpdate<'_>,
    ) -> Result<Option<User>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let Some(mut user) = Self::lock_user(&mut tx, id).await? else {
            return Ok(None);
        };
        apply(&mut user);
        Self::persist_user(&mut tx, &user).await?;

        tx.commit().await?;
        Ok(Some(user))
    }

    async fn expiry_reminder_candidates(&self) -> Result<Vec<User>, StorageError> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE premium AND premium_until IS NOT NULL AND NOT premium_reminded
            "#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count_users(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_entitled(&self, now: DateTime<Utc>) -> Result<i64, StorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE premium AND premium_until > $1")
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_signups_since(&self, since: DateTime<Utc>) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_deadline(&self, deadline: NewDeadline) -> Result<Deadline, StorageError> {
        let row = sqlx::query_as::<_, Deadline>(&format!(
            r#"
            INSERT INTO deadlines (id, user_id, title, due_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {DEADLINE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(deadline.user_id)
        .bind(&deadline.title)
        .bind(deadline.due_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn open_deadlines(&self, now: DateTime<Utc>) -> Result<Vec<Deadline>, StorageError> {
        let rows = sqlx::query_as::<_, Deadline>(&format!(
            r#"
            SELECT {DEADLINE_COLUMNS} FROM deadlines
            WHERE due_at > $1 AND NOT (reminded_24h AND reminded_1h)
            ORDER BY due_at ASC
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upcoming_deadlines(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Deadline>, StorageError> {
        let rows = sqlx::query_as::<_, Deadline>(&format!(
            r#"
            SELECT {DEADLINE_COLUMNS} FROM deadlines
            WHERE user_id = $1 AND due_at > $2
            ORDER BY due_at ASC
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_deadline(
        &self,
        id: DeadlineId,
        apply: DeadlineUpdate<'_>,
    ) -> Result<Option<Deadline>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Deadline>(&format!(
            "SELECT {DEADLINE_COLUMNS} FROM deadlines WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(mut deadline) = row else {
            return Ok(None);
        };

        apply(&mut deadline);

        sqlx::query(
            r#"
            UPDATE deadlines
            SET title = $2, due_at = $3, reminded_24h = $4, reminded_1h = $5
            WHERE id = $1
            "#,
        )
        .bind(deadline.id)
        .bind(&deadline.title)
        .bind(deadline.due_at)
        .bind(deadline.reminded_24h)
        .bind(deadline.reminded_1h)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(deadline))
    }

    async fn delete_deadline(&self, id: DeadlineId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM deadlines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_payment(
        &self,
        payment: NewPayment,
        created_at: DateTime<Utc>,
    ) -> Result<PaymentRequest, StorageError> {
        let row = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            INSERT INTO payments (id, user_id, amount_minor, proof_ref, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(payment.user_id)
        .bind(payment.amount_minor)
        .bind(&payment.proof_ref)
        .bind(&payment.comment)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn fetch_payment(&self, id: PaymentId) -> Result<Option<PaymentRequest>, StorageError> {
        let row = sqlx::query_as::<_, PaymentRequest>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn pending_payments(&self) -> Result<Vec<PaymentRequest>, StorageError> {
        let rows = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE status = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(PaymentStatus::Pending)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_payment_with_user(
        &self,
        id: PaymentId,
        apply: PaymentWithUserUpdate<'_>,
    ) -> Result<(PaymentRequest, User), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StorageError::Database)?;

        let row = sqlx::query_as::<_, PaymentRequest>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StorageError::Database)?;
        let Some(mut payment) = row else {
            return Err(CoreError::PaymentNotFound(id));
        };

        let Some(mut user) = Self::lock_user(&mut tx, payment.user_id)
            .await
            .map_err(StorageError::Database)?
        else {
            return Err(CoreError::UserNotFound(payment.user_id));
        };

        // Dropping the transaction rolls back; only an Ok closure commits.
        apply(&mut payment, &mut user)?;

        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, admin_note = $3, decided_at = $4
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .bind(payment.status)
        .bind(&payment.admin_note)
        .bind(payment.decided_at)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        Self::persist_user(&mut tx, &user)
            .await
            .map_err(StorageError::Database)?;

        tx.commit().await.map_err(StorageError::Database)?;
        Ok((payment, user))
    }

    async fn usage_count(
        &self,
        user_id: UserId,
        feature: &str,
        day: NaiveDate,
    ) -> Result<i64, StorageError> {
        let counter = sqlx::query_as::<_, UsageCounter>(
            r#"
            SELECT user_id, feature, day, count FROM usage_counters
            WHERE user_id = $1 AND feature = $2 AND day = $3
            "#,
        )
        .bind(user_id)
        .bind(feature)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;
        Ok(counter.map_or(0, |c| c.count))
    }

    async fn increment_usage(
        &self,
        user_id: UserId,
        feature: &str,
        day: NaiveDate,
    ) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO usage_counters (user_id, feature, day, count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (user_id, feature, day)
            DO UPDATE SET count = usage_counters.count + 1
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(feature)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn prune_usage_before(&self, cutoff: NaiveDate) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM usage_counters WHERE day < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
