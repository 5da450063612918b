/// In-memory storage
///
/// Mutex-guarded maps mirroring the PostgreSQL schema. Every trait method
/// takes the lock once, so each call is atomic with respect to every other
/// call, which is the same row-level guarantee the Postgres implementation gets
/// from `SELECT ... FOR UPDATE`. Component and scheduler tests run against
/// this implementation.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::deadline::{Deadline, DeadlineId, NewDeadline};
use crate::models::payment::{NewPayment, PaymentId, PaymentRequest, PaymentStatus};
use crate::models::user::{NewUser, User, UserId};
use crate::storage::{
    DeadlineUpdate, PaymentWithUserUpdate, Storage, StorageError, UserUpdate,
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    deadlines: HashMap<DeadlineId, Deadline>,
    payments: HashMap<PaymentId, PaymentRequest>,
    usage: HashMap<(UserId, String, NaiveDate), i64>,
}

/// In-memory [`Storage`] implementation
#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    /// Creates empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn create_user_if_absent(&self, user: NewUser) -> Result<bool, StorageError> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.id) {
            return Ok(false);
        }
        tables.users.insert(
            user.id,
            User {
                id: user.id,
                full_name: user.full_name,
                handle: user.handle,
                premium: false,
                premium_until: None,
                premium_reminded: false,
                referral_count: 0,
                referrer_id: user.referrer_id,
                signup_source: user.signup_source,
                created_at: user.created_at,
            },
        );
        Ok(true)
    }

    async fn update_user(
        &self,
        id: UserId,
        apply: UserUpdate<'_>,
    ) -> Result<Option<User>, StorageError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            apply(user);
            user.clone()
        }))
    }

    async fn expiry_reminder_candidates(&self) -> Result<Vec<User>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.premium && u.premium_until.is_some() && !u.premium_reminded)
            .cloned()
            .collect())
    }

    async fn count_users(&self) -> Result<i64, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.len() as i64)
    }

    async fn count_entitled(&self, now: DateTime<Utc>) -> Result<i64, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().filter(|u| u.is_entitled_at(now)).count() as i64)
    }

    async fn count_signups_since(&self, since: DateTime<Utc>) -> Result<i64, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().filter(|u| u.created_at >= since).count() as i64)
    }

    async fn create_deadline(&self, deadline: NewDeadline) -> Result<Deadline, StorageError> {
        let mut tables = self.tables.lock().await;
        let row = Deadline {
            id: Uuid::new_v4(),
            user_id: deadline.user_id,
            title: deadline.title,
            due_at: deadline.due_at,
            reminded_24h: false,
            reminded_1h: false,
        };
        tables.deadlines.insert(row.id, row.clone());
        Ok(row)
    }

    async fn open_deadlines(&self, now: DateTime<Utc>) -> Result<Vec<Deadline>, StorageError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Deadline> = tables
            .deadlines
            .values()
            .filter(|d| d.due_at > now && !d.is_fully_reminded())
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.due_at);
        Ok(rows)
    }

    async fn upcoming_deadlines(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Deadline>, StorageError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Deadline> = tables
            .deadlines
            .values()
            .filter(|d| d.user_id == user_id && d.due_at > now)
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.due_at);
        Ok(rows)
    }

    async fn update_deadline(
        &self,
        id: DeadlineId,
        apply: DeadlineUpdate<'_>,
    ) -> Result<Option<Deadline>, StorageError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.deadlines.get_mut(&id).map(|deadline| {
            apply(deadline);
            deadline.clone()
        }))
    }

    async fn delete_deadline(&self, id: DeadlineId) -> Result<bool, StorageError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.deadlines.remove(&id).is_some())
    }

    async fn create_payment(
        &self,
        payment: NewPayment,
        created_at: DateTime<Utc>,
    ) -> Result<PaymentRequest, StorageError> {
        let mut tables = self.tables.lock().await;
        let row = PaymentRequest {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            amount_minor: payment.amount_minor,
            proof_ref: payment.proof_ref,
            comment: payment.comment,
            status: PaymentStatus::Pending,
            admin_note: None,
            created_at,
            decided_at: None,
        };
        tables.payments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn fetch_payment(&self, id: PaymentId) -> Result<Option<PaymentRequest>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn pending_payments(&self) -> Result<Vec<PaymentRequest>, StorageError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<PaymentRequest> = tables
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.created_at);
        Ok(rows)
    }

    async fn update_payment_with_user(
        &self,
        id: PaymentId,
        apply: PaymentWithUserUpdate<'_>,
    ) -> Result<(PaymentRequest, User), CoreError> {
        let mut tables = self.tables.lock().await;

        let mut payment = tables
            .payments
            .get(&id)
            .cloned()
            .ok_or(CoreError::PaymentNotFound(id))?;
        let mut user = tables
            .users
            .get(&payment.user_id)
            .cloned()
            .ok_or(CoreError::UserNotFound(payment.user_id))?;

        // Mutate copies; only an Ok from the closure gets written back.
        apply(&mut payment, &mut user)?;

        tables.payments.insert(payment.id, payment.clone());
        tables.users.insert(user.id, user.clone());
        Ok((payment, user))
    }

    async fn usage_count(
        &self,
        user_id: UserId,
        feature: &str,
        day: NaiveDate,
    ) -> Result<i64, StorageError> {
        let tables = self.tables.lock().await;
        Ok(*tables
            .usage
            .get(&(user_id, feature.to_string(), day))
            .unwrap_or(&0))
    }

    async fn increment_usage(
        &self,
        user_id: UserId,
        feature: &str,
        day: NaiveDate,
    ) -> Result<i64, StorageError> {
        let mut tables = self.tables.lock().await;
        let count = tables
            .usage
            .entry((user_id, feature.to_string(), day))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn prune_usage_before(&self, cutoff: NaiveDate) -> Result<u64, StorageError> {
        let mut tables = self.tables.lock().await;
        let before = tables.usage.len();
        tables.usage.retain(|(_, _, day), _| *day >= cutoff);
        Ok((before - tables.usage.len()) as u64)
    }
}
