//! Shared fixtures for component tests
//!
//! Components run against the in-memory storage with a pinned manual clock
//! and a recording notifier, so every time-dependent property can be
//! asserted at exact instants.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use studyhall_core::clock::{Clock, ManualClock};
use studyhall_core::models::user::{NewUser, UserId};
use studyhall_core::notifier::MockNotifier;
use studyhall_core::storage::{MemoryStorage, Storage};

pub struct TestContext {
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<MockNotifier>,
}

/// Fixed reference instant: 2024-06-01 12:00:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Fresh context pinned to [`t0`] in a +05:00 deployment
pub fn context() -> TestContext {
    TestContext {
        storage: Arc::new(MemoryStorage::new()),
        clock: Arc::new(ManualClock::new(t0(), "+05:00".parse().unwrap())),
        notifier: Arc::new(MockNotifier::new()),
    }
}

/// Creates a bare user row with no premium
pub async fn seed_user(ctx: &TestContext, id: UserId) {
    ctx.storage
        .create_user_if_absent(NewUser {
            id,
            full_name: None,
            handle: None,
            referrer_id: None,
            signup_source: None,
            created_at: ctx.clock.now(),
        })
        .await
        .expect("seed user");
}
