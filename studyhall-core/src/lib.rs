//! # StudyHall Core
//!
//! Entitlement, reward, and reminder core for the StudyHall student
//! assistant. This crate is a library with no wire protocol of its own; the
//! message-handling layer and the admin surface consume it, and the
//! `studyhall-worker` binary runs its background loops.
//!
//! ## Module Organization
//!
//! - `models`: database models and the payment state machine
//! - `storage`: the row-level atomic storage trait, Postgres and in-memory
//!   implementations
//! - `db`: connection pool and embedded migrations
//! - `entitlement`: premium flag/expiry ownership and the stacking rule
//! - `referral`: signup trials and referral reward crossings
//! - `payments`: the manually-gated payment ledger
//! - `rate_limit`: per-(user, feature, day) usage gating
//! - `clock`, `time`: timezone-aware now and timestamp normalization
//! - `notifier`: outbound delivery seam
//! - `error`: common error taxonomy

pub mod clock;
pub mod db;
pub mod entitlement;
pub mod error;
pub mod models;
pub mod notifier;
pub mod payments;
pub mod rate_limit;
pub mod referral;
pub mod storage;
pub mod time;

/// Current version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
