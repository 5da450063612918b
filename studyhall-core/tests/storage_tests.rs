//! Storage contract tests against the in-memory implementation
//!
//! The foreground surfaces (deadline CRUD, admin statistics) talk to
//! storage directly; these tests pin down that contract where no component
//! wraps it.

mod common;

use chrono::Duration;
use common::{context, seed_user, t0};
use studyhall_core::models::deadline::{Deadline, NewDeadline};
use studyhall_core::models::user::{NewUser, User};
use studyhall_core::storage::Storage;

#[tokio::test]
async fn create_user_is_first_seen_only() {
    let ctx = context();

    let new_user = NewUser {
        id: 1,
        full_name: Some("Aziza".to_string()),
        handle: Some("aziza".to_string()),
        referrer_id: None,
        signup_source: Some("uni".to_string()),
        created_at: t0(),
    };
    assert!(ctx.storage.create_user_if_absent(new_user.clone()).await.unwrap());
    assert!(!ctx.storage.create_user_if_absent(new_user).await.unwrap());

    let user = ctx.storage.fetch_user(1).await.unwrap().unwrap();
    assert!(!user.premium);
    assert_eq!(user.signup_source.as_deref(), Some("uni"));
}

#[tokio::test]
async fn deadline_crud_round_trip() {
    let ctx = context();
    seed_user(&ctx, 1).await;

    let soon = ctx
        .storage
        .create_deadline(NewDeadline {
            user_id: 1,
            title: "Lab report".to_string(),
            due_at: t0() + Duration::hours(6),
        })
        .await
        .unwrap();
    let later = ctx
        .storage
        .create_deadline(NewDeadline {
            user_id: 1,
            title: "Term paper".to_string(),
            due_at: t0() + Duration::days(12),
        })
        .await
        .unwrap();
    // Someone else's deadline stays out of user 1's list
    seed_user(&ctx, 2).await;
    ctx.storage
        .create_deadline(NewDeadline {
            user_id: 2,
            title: "Other".to_string(),
            due_at: t0() + Duration::days(1),
        })
        .await
        .unwrap();

    let upcoming = ctx.storage.upcoming_deadlines(1, t0()).await.unwrap();
    assert_eq!(
        upcoming.iter().map(|d| d.id).collect::<Vec<_>>(),
        vec![soon.id, later.id]
    );

    assert!(ctx.storage.delete_deadline(soon.id).await.unwrap());
    assert!(!ctx.storage.delete_deadline(soon.id).await.unwrap());
    assert_eq!(ctx.storage.upcoming_deadlines(1, t0()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn open_deadlines_skip_past_and_fully_reminded_rows() {
    let ctx = context();
    seed_user(&ctx, 1).await;

    let open = ctx
        .storage
        .create_deadline(NewDeadline {
            user_id: 1,
            title: "Open".to_string(),
            due_at: t0() + Duration::hours(2),
        })
        .await
        .unwrap();
    ctx.storage
        .create_deadline(NewDeadline {
            user_id: 1,
            title: "Past".to_string(),
            due_at: t0() - Duration::hours(2),
        })
        .await
        .unwrap();
    let done = ctx
        .storage
        .create_deadline(NewDeadline {
            user_id: 1,
            title: "Done".to_string(),
            due_at: t0() + Duration::hours(3),
        })
        .await
        .unwrap();
    ctx.storage
        .update_deadline(done.id, &|d: &mut Deadline| {
            d.reminded_24h = true;
            d.reminded_1h = true;
        })
        .await
        .unwrap();

    let rows = ctx.storage.open_deadlines(t0()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, open.id);
}

#[tokio::test]
async fn admin_counts_reflect_entitlement_and_signup_times() {
    let ctx = context();
    seed_user(&ctx, 1).await;
    seed_user(&ctx, 2).await;
    ctx.storage
        .create_user_if_absent(NewUser {
            id: 3,
            full_name: None,
            handle: None,
            referrer_id: None,
            signup_source: None,
            created_at: t0() - Duration::days(2),
        })
        .await
        .unwrap();

    ctx.storage
        .update_user(1, &|u: &mut User| {
            u.premium = true;
            u.premium_until = Some(t0() + Duration::days(1));
        })
        .await
        .unwrap();
    // Lapsed flag still set: must not count as entitled
    ctx.storage
        .update_user(2, &|u: &mut User| {
            u.premium = true;
            u.premium_until = Some(t0() - Duration::days(1));
        })
        .await
        .unwrap();

    assert_eq!(ctx.storage.count_users().await.unwrap(), 3);
    assert_eq!(ctx.storage.count_entitled(t0()).await.unwrap(), 1);
    assert_eq!(
        ctx.storage
            .count_signups_since(t0() - Duration::hours(1))
            .await
            .unwrap(),
        2
    );
}
