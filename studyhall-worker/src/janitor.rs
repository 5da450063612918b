/// Usage-counter janitor
///
/// Usage counters are keyed by calendar day and created lazily, so nothing
/// else ever deletes them. This loop prunes days older than the retention
/// window on a long interval, keeping the keyspace bounded without any
/// coordination with the rate limiter: the limiter only ever reads today's
/// row, which the janitor never touches.
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use studyhall_core::clock::Clock;
use studyhall_core::storage::Storage;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Janitor configuration
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// How often to prune
    pub interval: Duration,

    /// How many days of counters to keep
    pub retention_days: i64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        JanitorConfig {
            interval: Duration::from_secs(3600),
            retention_days: 7,
        }
    }
}

/// Periodic counter pruner
pub struct UsageJanitor {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    config: JanitorConfig,
    shutdown_token: CancellationToken,
}

impl UsageJanitor {
    /// Creates a janitor with the default configuration
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(storage, clock, JanitorConfig::default())
    }

    /// Creates a janitor with a custom configuration
    pub fn with_config(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        config: JanitorConfig,
    ) -> Self {
        UsageJanitor {
            storage,
            clock,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the pruning loop until shutdown
    pub async fn run(&self) {
        tracing::info!(
            retention_days = self.config.retention_days,
            "Usage janitor starting"
        );

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = sleep(self.config.interval) => {}
            }

            self.prune_once().await;
        }

        tracing::info!("Usage janitor stopped");
    }

    /// Prunes counters older than the retention window
    pub async fn prune_once(&self) {
        let cutoff = self.clock.today() - TimeDelta::days(self.config.retention_days);

        match self.storage.prune_usage_before(cutoff).await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::info!(removed, %cutoff, "Pruned old usage counters");
            }
            Err(e) => {
                tracing::error!(error = %e, "Usage pruning failed");
            }
        }
    }
}
