/// Outbound notification seam
///
/// The core never talks to the chat platform directly; it hands messages to
/// a [`Notifier`] and treats any failure uniformly as "retry later". The
/// reminder scheduler relies on this: a send that fails leaves the
/// corresponding reminder flag unset, so the next tick attempts delivery
/// again, while a send that succeeds marks the flag and is never repeated
/// for that threshold.
///
/// [`MockNotifier`] records deliveries and can be scripted to fail for
/// specific recipients, which is how the at-most-once and retry properties
/// are exercised in tests.
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::user::UserId;

/// Delivery failure; always retriable from the caller's point of view
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport reported an error (network, blocked recipient, ...)
    #[error("delivery failed: {0}")]
    Failed(String),

    /// The send did not complete within the bounded timeout
    #[error("delivery timed out")]
    TimedOut,
}

/// Sends a message to a user id
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `message` to `user_id`
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] on any failure; callers retry later rather
    /// than distinguishing causes.
    async fn send(&self, user_id: UserId, message: &str) -> Result<(), DeliveryError>;
}

/// Recording notifier for tests and demos
///
/// # Example
///
/// ```
/// use studyhall_core::notifier::{MockNotifier, Notifier};
///
/// # async fn example() {
/// let notifier = MockNotifier::new();
/// notifier.fail_user(7);
///
/// assert!(notifier.send(7, "hello").await.is_err());
/// notifier.heal_user(7);
/// assert!(notifier.send(7, "hello").await.is_ok());
/// assert_eq!(notifier.sent_to(7), 1);
/// # }
/// ```
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<(UserId, String)>>,
    failing: Mutex<HashSet<UserId>>,
}

impl MockNotifier {
    /// Creates an empty recording notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `user_id` fail until healed
    pub fn fail_user(&self, user_id: UserId) {
        self.failing.lock().unwrap().insert(user_id);
    }

    /// Lets sends to `user_id` succeed again
    pub fn heal_user(&self, user_id: UserId) {
        self.failing.lock().unwrap().remove(&user_id);
    }

    /// Snapshot of every delivered (recipient, message) pair, in order
    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of messages delivered to `user_id`
    pub fn sent_to(&self, user_id: UserId) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .count()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, user_id: UserId, message: &str) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(&user_id) {
            return Err(DeliveryError::Failed("recipient unreachable".into()));
        }
        self.sent.lock().unwrap().push((user_id, message.to_string()));
        Ok(())
    }
}
