//! Database connection management
//!
//! - `pool`: PostgreSQL connection pool configuration and creation
//! - `migrations`: embedded schema migration runner

pub mod migrations;
pub mod pool;

pub use migrations::run_migrations;
pub use pool::{create_pool, DatabaseConfig};
