//! # StudyHall Worker Library
//!
//! Background loops for the StudyHall core: the reminder scheduler that
//! delivers deadline and premium-expiry notifications, the usage-counter
//! janitor, and the HTTP notifier the loops deliver through.
//!
//! ## Modules
//!
//! - `scheduler`: threshold scanning and at-most-once reminder delivery
//! - `janitor`: usage-counter pruning
//! - `notify`: bot-API notifier implementation
//! - `config`: environment configuration

pub mod config;
pub mod janitor;
pub mod notify;
pub mod scheduler;
