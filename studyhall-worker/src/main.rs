//! # StudyHall Worker
//!
//! Runs the background loops of the StudyHall core: the reminder scheduler
//! and the usage-counter janitor. Foreground handlers (the chat layer, the
//! admin surface) mutate state through the same storage; this binary only
//! observes committed rows and delivers notifications.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p studyhall-worker
//! ```

use std::sync::Arc;

use studyhall_core::clock::SystemClock;
use studyhall_core::db::{create_pool, run_migrations};
use studyhall_core::storage::PgStorage;
use studyhall_worker::config::Config;
use studyhall_worker::janitor::UsageJanitor;
use studyhall_worker::notify::HttpNotifier;
use studyhall_worker::scheduler::ReminderScheduler;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyhall_worker=info,studyhall_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("StudyHall worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(config.database.clone()).await?;
    run_migrations(&pool).await?;

    let storage = Arc::new(PgStorage::new(pool));
    let clock = Arc::new(SystemClock::new(config.timezone_offset));
    let notifier = Arc::new(HttpNotifier::with_timeout(
        &config.bot_api_base,
        config.scheduler.notify_timeout,
    )?);

    let scheduler = ReminderScheduler::with_config(
        storage.clone(),
        notifier,
        clock.clone(),
        config.scheduler.clone(),
    );
    let janitor = UsageJanitor::with_config(storage, clock, config.janitor.clone());

    let scheduler_shutdown = scheduler.shutdown_token();
    let janitor_shutdown = janitor.shutdown_token();

    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });
    let janitor_handle = tokio::spawn(async move { janitor.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, letting in-flight work finish...");

    scheduler_shutdown.cancel();
    janitor_shutdown.cancel();

    scheduler_handle.await?;
    janitor_handle.await?;

    tracing::info!("Worker stopped");
    Ok(())
}
