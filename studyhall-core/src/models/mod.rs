//! Database models and data structures
//!
//! - `user`: user accounts with premium entitlement and referral fields
//! - `deadline`: user deadlines with per-threshold reminder flags
//! - `payment`: manually-gated payment requests and their state machine
//! - `usage`: per-(user, feature, day) usage counters

pub mod deadline;
pub mod payment;
pub mod usage;
pub mod user;

pub use deadline::{Deadline, DeadlineId, NewDeadline};
pub use payment::{NewPayment, PaymentId, PaymentRequest, PaymentStatus};
pub use usage::UsageCounter;
pub use user::{NewUser, User, UserId};
