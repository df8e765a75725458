//! Scheduler error types.
//!
//! Every fallible operation of the scheduling core returns a
//! [`SchedulerError`], so callers can classify failures for retry decisions
//! without string matching.

use thiserror::Error;

use crate::model::{CardId, SubjectId, UserId};

/// Errors that can occur when scheduling or recording reviews.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The submitted quality lies outside `[0, 5]`.
    #[error("invalid quality {0}: must be between 0 and 5")]
    InvalidQuality(i64),

    /// The card (or its schedule) does not exist for this user.
    #[error("unknown card: {0}")]
    UnknownCard(CardId),

    /// Another submission for the same card committed first.
    #[error("concurrent modification of card {card_id} (expected version {expected}, found {actual})")]
    ConcurrentModification {
        card_id: CardId,
        expected: u64,
        actual: u64,
    },

    /// The storage layer failed or timed out.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The (user, subject) pair has no cards.
    #[error("unknown scope: user {user} has no cards in subject {subject}")]
    UnknownScope { user: UserId, subject: SubjectId },

    /// Malformed request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SchedulerError {
    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Conflicts need a fresh read of state before the retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::ConcurrentModification { .. } | SchedulerError::StorageUnavailable(_)
        )
    }
}

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
