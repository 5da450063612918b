/// Payment request model and state machine
///
/// Payments are submitted by users with a proof reference (e.g. the file id
/// of an uploaded receipt) and decided manually by an admin. The status is a
/// small state machine with final terminal states:
///
/// ```text
/// pending → approved
/// pending → rejected
/// ```
///
/// Approving an already-terminal payment must fail rather than silently
/// re-granting entitlement, which is why every decision goes through
/// [`PaymentStatus::can_transition_to`] inside the same atomic storage
/// operation as the grant.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_status AS ENUM ('pending', 'approved', 'rejected');
///
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     amount_minor BIGINT NOT NULL,
///     proof_ref TEXT NOT NULL,
///     comment TEXT,
///     status payment_status NOT NULL DEFAULT 'pending',
///     admin_note TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     decided_at TIMESTAMPTZ
/// );
/// ```
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserId;

/// Payment row id
pub type PaymentId = Uuid;

/// Payment decision state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting a manual admin decision
    Pending,

    /// Approved; the plan extension has been granted
    Approved,

    /// Rejected; no entitlement change
    Rejected,
}

impl PaymentStatus {
    /// Converts status to string for database storage and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    /// Checks if the status is terminal (decision has been made)
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Approved | PaymentStatus::Rejected)
    }

    /// Checks if transition to the target status is valid
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Approved)
                | (PaymentStatus::Pending, PaymentStatus::Rejected)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment request row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentRequest {
    pub id: PaymentId,

    /// Payer
    pub user_id: UserId,

    /// Amount in minor currency units
    pub amount_minor: i64,

    /// Reference to the payment proof (receipt file id, transfer id, ...)
    pub proof_ref: String,

    /// Optional free-form note from the payer
    pub comment: Option<String>,

    /// Decision state
    pub status: PaymentStatus,

    /// Optional note the admin attached to the decision
    pub admin_note: Option<String>,

    /// When the request was submitted
    pub created_at: DateTime<Utc>,

    /// When the request reached a terminal state
    pub decided_at: Option<DateTime<Utc>>,
}

/// Input for submitting a new payment request
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: UserId,
    pub amount_minor: i64,
    pub proof_ref: String,
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_as_str() {
        assert_eq!(PaymentStatus::Pending.as_str(), "pending");
        assert_eq!(PaymentStatus::Approved.as_str(), "approved");
        assert_eq!(PaymentStatus::Rejected.as_str(), "rejected");
    }

    #[test]
    fn test_payment_status_is_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Approved.is_terminal());
        assert!(PaymentStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_payment_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Approved));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Rejected));

        // Terminal states cannot transition
        assert!(!PaymentStatus::Approved.can_transition_to(PaymentStatus::Rejected));
        assert!(!PaymentStatus::Approved.can_transition_to(PaymentStatus::Approved));
        assert!(!PaymentStatus::Rejected.can_transition_to(PaymentStatus::Approved));

        // Nothing transitions back to pending
        assert!(!PaymentStatus::Approved.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Rejected.can_transition_to(PaymentStatus::Pending));
    }
}
