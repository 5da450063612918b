//! Component tests for the payment ledger

mod common;

use chrono::Duration;
use common::{context, seed_user, t0, TestContext};
use studyhall_core::error::CoreError;
use studyhall_core::models::payment::{NewPayment, PaymentStatus};
use studyhall_core::models::user::User;
use studyhall_core::payments::PaymentLedger;
use studyhall_core::storage::Storage;

fn ledger(ctx: &TestContext) -> PaymentLedger {
    PaymentLedger::new(ctx.storage.clone(), ctx.notifier.clone(), ctx.clock.clone())
}

fn payment_for(user_id: i64) -> NewPayment {
    NewPayment {
        user_id,
        amount_minor: 25_000,
        proof_ref: "receipt-file-1".to_string(),
        comment: None,
    }
}

#[tokio::test]
async fn submitted_payment_is_pending() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    let ledger = ledger(&ctx);

    let payment = ledger.submit(payment_for(1)).await.unwrap();

    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.created_at, t0());
    assert!(payment.decided_at.is_none());
    assert_eq!(ledger.list_pending().await.unwrap().len(), 1);

    let stored = ctx
        .storage
        .fetch_payment(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn approval_grants_the_plan_and_notifies() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    let ledger = ledger(&ctx);

    let payment = ledger.submit(payment_for(1)).await.unwrap();
    let decided = ledger
        .approve(payment.id, Some("checked receipt".to_string()))
        .await
        .unwrap();

    assert_eq!(decided.status, PaymentStatus::Approved);
    assert_eq!(decided.admin_note.as_deref(), Some("checked receipt"));
    assert_eq!(decided.decided_at, Some(t0()));

    let user = ctx.storage.fetch_user(1).await.unwrap().unwrap();
    assert!(user.premium);
    assert_eq!(user.premium_until, Some(t0() + Duration::days(30)));
    assert_eq!(ctx.notifier.sent_to(1), 1);
}

#[tokio::test]
async fn approval_stacks_on_an_active_trial() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    let ledger = ledger(&ctx);

    // Trial already running, e.g. granted at signup
    ctx.storage
        .update_user(1, &|u: &mut User| {
            u.premium = true;
            u.premium_until = Some(t0() + Duration::hours(48));
        })
        .await
        .unwrap();

    let payment = ledger.submit(payment_for(1)).await.unwrap();
    ctx.clock.advance(Duration::hours(10));
    ledger.approve(payment.id, None).await.unwrap();

    // max(T0+48h, T0+10h) + 30d
    let user = ctx.storage.fetch_user(1).await.unwrap().unwrap();
    assert_eq!(
        user.premium_until,
        Some(t0() + Duration::hours(48) + Duration::days(30))
    );
    assert!(!user.premium_reminded);
}

#[tokio::test]
async fn double_approval_fails_and_grants_nothing_extra() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    let ledger = ledger(&ctx);

    let payment = ledger.submit(payment_for(1)).await.unwrap();
    ledger.approve(payment.id, None).await.unwrap();
    let until_after_first = ctx
        .storage
        .fetch_user(1)
        .await
        .unwrap()
        .unwrap()
        .premium_until;

    let err = ledger.approve(payment.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidTransition {
            status: PaymentStatus::Approved,
            ..
        }
    ));

    // The retried admin action must not move the expiry a second time
    let user = ctx.storage.fetch_user(1).await.unwrap().unwrap();
    assert_eq!(user.premium_until, until_after_first);
}

#[tokio::test]
async fn rejection_is_final_and_grants_nothing() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    let ledger = ledger(&ctx);

    let payment = ledger.submit(payment_for(1)).await.unwrap();
    let decided = ledger
        .reject(payment.id, Some("no matching transfer".to_string()))
        .await
        .unwrap();

    assert_eq!(decided.status, PaymentStatus::Rejected);
    let user = ctx.storage.fetch_user(1).await.unwrap().unwrap();
    assert!(!user.premium);
    assert_eq!(ctx.notifier.sent_to(1), 1);

    // Neither decision applies on the now-terminal payment
    assert!(ledger.approve(payment.id, None).await.is_err());
    assert!(ledger.reject(payment.id, None).await.is_err());
}

#[tokio::test]
async fn unknown_payment_reports_not_found() {
    let ctx = context();
    let ledger = ledger(&ctx);

    let err = ledger.approve(uuid::Uuid::new_v4(), None).await.unwrap_err();
    assert!(matches!(err, CoreError::PaymentNotFound(_)));
}

#[tokio::test]
async fn pending_list_is_oldest_first_and_shrinks_on_decisions() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    seed_user(&ctx, 2).await;
    let ledger = ledger(&ctx);

    let first = ledger.submit(payment_for(1)).await.unwrap();
    ctx.clock.advance(Duration::minutes(5));
    let second = ledger.submit(payment_for(2)).await.unwrap();

    let pending = ledger.list_pending().await.unwrap();
    assert_eq!(
        pending.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    ledger.approve(first.id, None).await.unwrap();
    let pending = ledger.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
}

#[tokio::test]
async fn failed_decision_notification_does_not_undo_the_decision() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    ctx.notifier.fail_user(1);
    let ledger = ledger(&ctx);

    let payment = ledger.submit(payment_for(1)).await.unwrap();
    let decided = ledger.approve(payment.id, None).await.unwrap();

    assert_eq!(decided.status, PaymentStatus::Approved);
    let user = ctx.storage.fetch_user(1).await.unwrap().unwrap();
    assert!(user.premium);
}
