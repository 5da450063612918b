/// Database migration runner
///
/// Migrations live in the `migrations/` directory at the crate root and are
/// embedded into the binary at compile time, so the worker can bring a
/// fresh database up to date at startup without external tooling.
use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Runs all pending database migrations
///
/// # Errors
///
/// Returns an error if a migration fails to execute; the failed migration
/// is rolled back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}
