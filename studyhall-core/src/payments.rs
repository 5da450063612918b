/// Payment ledger
///
/// Users submit payment requests with a proof reference; an admin approves
/// or rejects each one manually. A decision is an explicit guarded state
/// transition: anything but pending → approved / pending → rejected fails
/// with `InvalidTransition`, so a retried admin action can never grant the
/// same payment twice.
///
/// The transition and the resulting entitlement grant run inside one atomic
/// storage operation (`update_payment_with_user`); a payment can never end
/// up approved without its extension applied, or vice versa.
use std::sync::Arc;

use crate::clock::Clock;
use crate::entitlement::extend_premium;
use crate::error::{CoreError, CoreResult};
use crate::models::payment::{NewPayment, PaymentId, PaymentRequest, PaymentStatus};
use crate::models::user::User;
use crate::notifier::Notifier;
use crate::storage::{Storage, StorageError};

/// Days of premium an approved payment buys
pub const DEFAULT_PLAN_DAYS: i64 = 30;

/// Payment administration component
#[derive(Clone)]
pub struct PaymentLedger {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    plan_days: i64,
}

impl PaymentLedger {
    /// Creates the ledger with the default plan length
    pub fn new(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_plan_days(storage, notifier, clock, DEFAULT_PLAN_DAYS)
    }

    /// Creates the ledger with a custom plan length
    pub fn with_plan_days(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        plan_days: i64,
    ) -> Self {
        PaymentLedger {
            storage,
            notifier,
            clock,
            plan_days,
        }
    }

    /// Records a new payment request awaiting manual review
    pub async fn submit(&self, payment: NewPayment) -> CoreResult<PaymentRequest> {
        let row = self
            .storage
            .create_payment(payment, self.clock.now())
            .await?;
        tracing::info!(
            payment_id = %row.id,
            user_id = row.user_id,
            amount_minor = row.amount_minor,
            "Payment request submitted"
        );
        Ok(row)
    }

    /// Approves a pending payment and grants the plan extension
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransition`] when the payment is already
    /// decided; the entitlement is not touched in that case.
    pub async fn approve(
        &self,
        payment_id: PaymentId,
        note: Option<String>,
    ) -> CoreResult<PaymentRequest> {
        let now = self.clock.now();
        let plan_days = self.plan_days;

        let apply = move |payment: &mut PaymentRequest, user: &mut User| {
            guard_transition(payment, PaymentStatus::Approved)?;
            payment.status = PaymentStatus::Approved;
            payment.admin_note = note.clone();
            payment.decided_at = Some(now);
            extend_premium(user, plan_days, now);
            Ok(())
        };
        let (payment, user) = self
            .storage
            .update_payment_with_user(payment_id, &apply)
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            user_id = user.id,
            plan_days,
            "Payment approved"
        );
        self.notify_payer(
            &payment,
            &format!(
                "Your payment was approved. Premium is active for {plan_days} more days."
            ),
        )
        .await;
        Ok(payment)
    }

    /// Rejects a pending payment; no entitlement change
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransition`] when the payment is already decided.
    pub async fn reject(
        &self,
        payment_id: PaymentId,
        note: Option<String>,
    ) -> CoreResult<PaymentRequest> {
        let now = self.clock.now();

        let apply = move |payment: &mut PaymentRequest, _user: &mut User| {
            guard_transition(payment, PaymentStatus::Rejected)?;
            payment.status = PaymentStatus::Rejected;
            payment.admin_note = note.clone();
            payment.decided_at = Some(now);
            Ok(())
        };
        let (payment, _) = self
            .storage
            .update_payment_with_user(payment_id, &apply)
            .await?;

        tracing::info!(payment_id = %payment.id, user_id = payment.user_id, "Payment rejected");
        self.notify_payer(
            &payment,
            "Your payment could not be confirmed. Contact support if you believe this is wrong.",
        )
        .await;
        Ok(payment)
    }

    /// Payments awaiting a decision, oldest first
    pub async fn list_pending(&self) -> Result<Vec<PaymentRequest>, StorageError> {
        self.storage.pending_payments().await
    }

    async fn notify_payer(&self, payment: &PaymentRequest, message: &str) {
        if let Err(e) = self.notifier.send(payment.user_id, message).await {
            tracing::warn!(
                payment_id = %payment.id,
                user_id = payment.user_id,
                error = %e,
                "Payment decision notification not delivered"
            );
        }
    }
}

fn guard_transition(payment: &PaymentRequest, target: PaymentStatus) -> Result<(), CoreError> {
    if !payment.status.can_transition_to(target) {
        return Err(CoreError::InvalidTransition {
            id: payment.id,
            status: payment.status,
        });
    }
    Ok(())
}
