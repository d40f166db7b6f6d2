//! Scheduler errors

use crate::store::StoreError;
use crate::ticket::IllegalTransition;

/// Error type for scheduler operations.
///
/// Agent failures never surface here: they are recorded on the ticket and
/// fed into the retry path.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scheduler has been disposed")]
    Disposed,

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
