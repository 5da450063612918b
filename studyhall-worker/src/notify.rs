/// HTTP notifier
///
/// Delivers messages through the chat platform's bot API. One POST per
/// message; any non-success status, transport error, or timeout is reported
/// as a retriable delivery failure; the scheduler treats all of them the
/// same and tries again next tick.
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use studyhall_core::models::user::UserId;
use studyhall_core::notifier::{DeliveryError, Notifier};

/// Default bound on a single send request
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot-API-backed [`Notifier`]
pub struct HttpNotifier {
    client: reqwest::Client,
    send_url: String,
}

impl HttpNotifier {
    /// Creates a notifier for the given bot API base URL
    ///
    /// `api_base` already carries the bot credential, e.g.
    /// `https://api.telegram.org/bot<token>`.
    pub fn new(api_base: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(api_base, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a notifier with a custom per-request timeout
    pub fn with_timeout(api_base: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(HttpNotifier {
            client,
            send_url: format!("{}/sendMessage", api_base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, user_id: UserId, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.send_url)
            .json(&json!({
                "chat_id": user_id,
                "text": message,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::TimedOut
                } else {
                    DeliveryError::Failed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            // A blocked recipient surfaces as a 4xx here; retried like any
            // other failure until the entitlement or deadline passes.
            return Err(DeliveryError::Failed(format!(
                "send returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
