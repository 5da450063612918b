//! Component tests for the daily rate limiter

mod common;

use chrono::Duration;
use common::{context, TestContext};
use studyhall_core::rate_limit::RateLimiter;

fn limiter(ctx: &TestContext) -> RateLimiter {
    RateLimiter::new(ctx.storage.clone(), ctx.clock.clone())
}

#[tokio::test]
async fn exactly_n_consumes_are_allowed_per_day() {
    let ctx = context();
    let limiter = limiter(&ctx);
    let limit = 3;

    for used in 0..limit {
        let decision = limiter.check(1, "tutor", limit).await.unwrap();
        assert!(decision.allowed, "use {} should be allowed", used + 1);
        limiter.increment(1, "tutor").await.unwrap();
    }

    let decision = limiter.check(1, "tutor", limit).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0);
}

#[tokio::test]
async fn remaining_counts_down_to_zero() {
    let ctx = context();
    let limiter = limiter(&ctx);

    let decision = limiter.check(1, "tutor", 3).await.unwrap();
    assert_eq!(decision.remaining, 2);

    limiter.increment(1, "tutor").await.unwrap();
    let decision = limiter.check(1, "tutor", 3).await.unwrap();
    assert_eq!(decision.remaining, 1);
}

#[tokio::test]
async fn features_and_users_count_independently() {
    let ctx = context();
    let limiter = limiter(&ctx);

    limiter.increment(1, "tutor").await.unwrap();
    limiter.increment(1, "tutor").await.unwrap();

    assert!(!limiter.check(1, "tutor", 2).await.unwrap().allowed);
    assert!(limiter.check(1, "essay", 2).await.unwrap().allowed);
    assert!(limiter.check(2, "tutor", 2).await.unwrap().allowed);
}

#[tokio::test]
async fn a_new_local_day_resets_availability() {
    let ctx = context();
    let limiter = limiter(&ctx);

    limiter.increment(1, "tutor").await.unwrap();
    assert!(!limiter.check(1, "tutor", 1).await.unwrap().allowed);

    // t0 is 12:00 UTC = 17:00 at +05:00; midnight is 7 hours away
    ctx.clock.advance(Duration::hours(6));
    assert!(!limiter.check(1, "tutor", 1).await.unwrap().allowed);

    ctx.clock.advance(Duration::hours(2));
    let decision = limiter.check(1, "tutor", 1).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 0);
}

#[tokio::test]
async fn old_days_prune_without_touching_today() {
    let ctx = context();
    let limiter = limiter(&ctx);
    use studyhall_core::clock::Clock;
    use studyhall_core::storage::Storage;

    limiter.increment(1, "tutor").await.unwrap();
    ctx.clock.advance(Duration::days(10));
    limiter.increment(1, "tutor").await.unwrap();

    let cutoff = ctx.clock.today() - Duration::days(7);
    let removed = ctx.storage.prune_usage_before(cutoff).await.unwrap();
    assert_eq!(removed, 1);

    // Today's counter survives the prune
    assert!(!limiter.check(1, "tutor", 1).await.unwrap().allowed);
}
