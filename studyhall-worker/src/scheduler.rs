/// Reminder scheduler
///
/// A single cooperative loop that scans deadlines and expiring entitlements
/// on a fixed tick and delivers each threshold's notification at most once.
///
/// # Threshold state
///
/// Every (entity, threshold) pair moves through not-due → in-window-unsent
/// → sent. "Sent" is the persisted reminder flag and never reverts; the
/// other two states are derived from `due - now` on each tick. A send that
/// fails leaves the flag unset, so the next tick retries: transient
/// notifier failures delay delivery by one interval, they never lose it.
///
/// # Tick discipline
///
/// - Per-item failures (one unreachable recipient, one bad row) are logged
///   and skipped; they never halt the rest of the scan.
/// - Loop-level storage failures abort the tick; the loop backs off one
///   interval and tries again. The loop never terminates on its own.
/// - Every notifier call is wrapped in a bounded timeout so one stuck
///   recipient cannot stall the tick for everyone else.
/// - Shutdown is graceful: the token stops new ticks, an in-flight tick
///   runs to completion, so one pass is never half-applied.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use studyhall_core::clock::Clock;
use studyhall_core::models::deadline::Deadline;
use studyhall_core::models::user::{User, UserId};
use studyhall_core::notifier::Notifier;
use studyhall_core::storage::{Storage, StorageError};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed tick interval
    pub tick_interval: Duration,

    /// Upper bound on a single notifier call
    pub notify_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            tick_interval: Duration::from_secs(60),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

/// Deadline early-warning threshold, in hours
const DEADLINE_LONG_WINDOW_HOURS: i64 = 24;

/// Deadline last-call threshold, in hours
const DEADLINE_SHORT_WINDOW_HOURS: i64 = 1;

/// Premium expiry warning threshold, in hours
const EXPIRY_WINDOW_HOURS: i64 = 24;

/// Reminder scheduler
///
/// The sole writer of the reminder flags; foreground handlers write
/// everything else through the same storage, so each tick observes
/// committed state.
pub struct ReminderScheduler {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
}

impl ReminderScheduler {
    /// Creates a scheduler with the default configuration
    pub fn new(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_config(storage, notifier, clock, SchedulerConfig::default())
    }

    /// Creates a scheduler with a custom configuration
    pub fn with_config(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        ReminderScheduler {
            storage,
            notifier,
            clock,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop after the in-flight tick finishes
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the scheduler loop until shutdown
    pub async fn run(&self) {
        tracing::info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            "Reminder scheduler starting"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "Tick aborted, backing off one interval");
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = sleep(self.config.tick_interval) => {}
            }
        }

        tracing::info!("Reminder scheduler stopped");
    }

    /// Runs one scan over deadlines and expiring entitlements
    ///
    /// Public so tests (and operational tooling) can drive ticks without
    /// the loop's timing.
    ///
    /// # Errors
    ///
    /// Returns an error only for loop-level storage failures; per-item
    /// problems are handled inside.
    pub async fn tick(&self) -> Result<(), StorageError> {
        let now = self.clock.now();

        let deadlines = self.storage.open_deadlines(now).await?;
        for deadline in &deadlines {
            self.remind_deadline(deadline, now).await;
        }

        let expiring = self.storage.expiry_reminder_candidates().await?;
        for user in &expiring {
            self.remind_expiry(user, now).await;
        }

        tracing::debug!(
            deadlines = deadlines.len(),
            expiry_candidates = expiring.len(),
            "Tick complete"
        );
        Ok(())
    }

    /// Fires whichever deadline thresholds are open and unsent
    ///
    /// The 24-hour and 1-hour thresholds are independent: each fires at
    /// most once, and both can fire in the same tick only when both windows
    /// are simultaneously open (e.g. a deadline created 30 minutes ahead).
    async fn remind_deadline(&self, deadline: &Deadline, now: DateTime<Utc>) {
        let to_due = deadline.due_at - now;

        if !deadline.reminded_24h && window_open(to_due, TimeDelta::hours(DEADLINE_LONG_WINDOW_HOURS)) {
            let message = deadline_message(deadline, "in less than 24 hours");
            if self.notify(deadline.user_id, &message).await {
                self.mark_deadline(deadline, |d| d.reminded_24h = true).await;
            }
        }

        if !deadline.reminded_1h && window_open(to_due, TimeDelta::hours(DEADLINE_SHORT_WINDOW_HOURS)) {
            let message = deadline_message(deadline, "in less than 1 hour");
            if self.notify(deadline.user_id, &message).await {
                self.mark_deadline(deadline, |d| d.reminded_1h = true).await;
            }
        }
    }

    /// Fires the premium-expiry warning once per entitlement period
    async fn remind_expiry(&self, user: &User, now: DateTime<Utc>) {
        let Some(until) = user.premium_until else {
            return;
        };
        if !window_open(until - now, TimeDelta::hours(EXPIRY_WINDOW_HOURS)) {
            return;
        }

        let message = format!(
            "Your premium access expires {}. Renew to keep your premium features.",
            until
                .with_timezone(&self.clock.offset())
                .format("on %d.%m.%Y at %H:%M")
        );
        if self.notify(user.id, &message).await {
            let updated = self
                .storage
                .update_user(user.id, &|u: &mut User| u.premium_reminded = true)
                .await;
            if let Err(e) = updated {
                tracing::error!(user_id = user.id, error = %e, "Failed to mark expiry reminder");
            }
        }
    }

    /// Attempts one bounded delivery; true means the flag may be set
    async fn notify(&self, user_id: UserId, message: &str) -> bool {
        match timeout(self.config.notify_timeout, self.notifier.send(user_id, message)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(user_id, error = %e, "Delivery failed, will retry next tick");
                false
            }
            Err(_) => {
                tracing::warn!(
                    user_id,
                    timeout_secs = self.config.notify_timeout.as_secs(),
                    "Delivery timed out, will retry next tick"
                );
                false
            }
        }
    }

    async fn mark_deadline(&self, deadline: &Deadline, set: fn(&mut Deadline)) {
        if let Err(e) = self.storage.update_deadline(deadline.id, &set).await {
            tracing::error!(
                deadline_id = %deadline.id,
                error = %e,
                "Failed to mark deadline reminder"
            );
        }
    }
}

/// A threshold window is open while `0 < remaining <= window`
fn window_open(remaining: TimeDelta, window: TimeDelta) -> bool {
    remaining > TimeDelta::zero() && remaining <= window
}

fn deadline_message(deadline: &Deadline, when: &str) -> String {
    format!("Reminder: \"{}\" is due {}.", deadline.title, when)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_open_bounds() {
        let window = TimeDelta::hours(24);

        assert!(window_open(TimeDelta::hours(24), window));
        assert!(window_open(TimeDelta::minutes(1), window));
        assert!(!window_open(TimeDelta::hours(24) + TimeDelta::seconds(1), window));
        assert!(!window_open(TimeDelta::zero(), window));
        assert!(!window_open(TimeDelta::minutes(-5), window));
    }
}
