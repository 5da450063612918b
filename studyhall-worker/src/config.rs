/// Configuration management for the worker
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `BOT_API_BASE`: bot API base URL including credential (required)
/// - `TIMEZONE_OFFSET`: deployment UTC offset, e.g. `+05:00` (default: +00:00)
/// - `TICK_INTERVAL_SECS`: scheduler tick interval (default: 60)
/// - `NOTIFY_TIMEOUT_SECS`: bound on one send (default: 10)
/// - `USAGE_RETENTION_DAYS`: counter retention for the janitor (default: 7)
/// - `RUST_LOG`: log filter (default: info)
use std::env;
use std::time::Duration;

use chrono::FixedOffset;
use studyhall_core::db::pool::DatabaseConfig;

use crate::janitor::JanitorConfig;
use crate::scheduler::SchedulerConfig;

/// Complete worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Bot API base URL, credential included
    pub bot_api_base: String,

    /// Deployment timezone offset
    pub timezone_offset: FixedOffset,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Janitor configuration
    pub janitor: JanitorConfig,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let bot_api_base = env::var("BOT_API_BASE")
            .map_err(|_| anyhow::anyhow!("BOT_API_BASE must be set"))?;

        let timezone_offset: FixedOffset = env::var("TIMEZONE_OFFSET")
            .unwrap_or_else(|_| "+00:00".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid TIMEZONE_OFFSET: {e}"))?;

        let tick_interval_secs: u64 = env::var("TICK_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()?;
        let notify_timeout_secs: u64 = env::var("NOTIFY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let usage_retention_days: i64 = env::var("USAGE_RETENTION_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()?;

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                ..Default::default()
            },
            bot_api_base,
            timezone_offset,
            scheduler: SchedulerConfig {
                tick_interval: Duration::from_secs(tick_interval_secs),
                notify_timeout: Duration::from_secs(notify_timeout_secs),
            },
            janitor: JanitorConfig {
                retention_days: usage_retention_days,
                ..Default::default()
            },
        })
    }
}
