/// Common error taxonomy
///
/// Nothing in this core is fatal to the process. `NotFound` variants map to
/// benign outcomes at the entitlement boundary (an unknown user is simply
/// "not entitled"); `InvalidTransition` rejects admin retries against
/// already-decided payments; storage failures surface to foreground callers
/// as a service error and make the scheduler back off one interval.
use thiserror::Error;

use crate::models::payment::{PaymentId, PaymentStatus};
use crate::models::user::UserId;
use crate::storage::StorageError;

/// Core result type alias
pub type CoreResult<T> = Result<T, CoreError>;

/// Unified core error type
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown user id
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// Unknown payment id
    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// The payment already reached a terminal state
    #[error("payment {id} is already {status}; decisions are final")]
    InvalidTransition {
        id: PaymentId,
        status: PaymentStatus,
    },

    /// The storage backend failed or is unreachable
    #[error(transparent)]
    Storage(#[from] StorageError),
}
