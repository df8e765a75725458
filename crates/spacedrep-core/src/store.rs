//! Card store contract.
//!
//! Implemented by the `spacedrep-store` crate. A store owns no scheduling
//! logic: it persists cards, schedule states, the attempt log and progress
//! ledgers, and answers range queries by due date and subject.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    Attempt, Card, CardId, ScheduleState, ScheduledCard, SubjectId, UserId, Versioned,
};
use crate::progress::{ProgressLedger, ProgressSnapshot, ReconcileReport};

/// A review to commit: the new state plus the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCommit {
    /// Version the new state was computed from.
    pub expected_version: u64,
    pub state: ScheduleState,
    pub attempt: Attempt,
}

/// One (user, subject) scope's cards, attempts and the user's counters,
/// read at a single point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    pub cards: Vec<ScheduledCard>,
    pub attempts: Vec<Attempt>,
    pub ledger: ProgressLedger,
}

/// Durable keyed storage for cards and their schedules.
///
/// Every mutating method is all-or-nothing: on error nothing it was asked to
/// write is visible.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Human-readable backend name (e.g. "memory").
    fn name(&self) -> &str;

    /// Store a card together with its initial schedule.
    async fn insert_card(&self, card: Card, state: ScheduleState) -> Result<()>;

    /// Fetch a card's content.
    async fn get_card(&self, card_id: CardId) -> Result<Card>;

    /// Remove a card, its schedule and its card-level aggregate. The card's
    /// attempts stay in the log.
    async fn delete_card(&self, card_id: CardId) -> Result<()>;

    /// All of a user's cards, optionally restricted to one subject.
    async fn list_cards(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
    ) -> Result<Vec<ScheduledCard>>;

    /// Subjects the user has at least one card or attempt in.
    async fn subjects(&self, user: &UserId) -> Result<Vec<SubjectId>>;

    /// Reviewed cards whose `due_at` is at or before `before`.
    async fn get_due(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
        before: DateTime<Utc>,
    ) -> Result<Vec<ScheduledCard>>;

    /// Cards that have never been reviewed.
    async fn get_new(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
    ) -> Result<Vec<ScheduledCard>>;

    /// Current schedule of a card with its version.
    async fn get_state(&self, card_id: CardId) -> Result<Versioned<ScheduleState>>;

    /// Write a new schedule, append the attempt and bump the aggregates as
    /// one unit. Fails with `ConcurrentModification` when the stored version
    /// differs from `commit.expected_version`.
    async fn commit_review(&self, commit: ReviewCommit) -> Result<ProgressSnapshot>;

    /// Append an attempt that does not reschedule its card and bump the
    /// aggregates as one unit.
    async fn append_attempt(&self, attempt: Attempt) -> Result<ProgressSnapshot>;

    /// The attempt log for a user, optionally restricted to one subject, in
    /// append order.
    async fn attempts(&self, user: &UserId, subject: Option<&SubjectId>) -> Result<Vec<Attempt>>;

    /// The user's maintained aggregates.
    async fn ledger(&self, user: &UserId) -> Result<ProgressLedger>;

    /// Cards, attempts and counters for one scope in one consistent read.
    async fn progress_view(&self, user: &UserId, subject: &SubjectId) -> Result<ProgressView>;

    /// Rebuild the (user, subject) aggregates from the attempt log, atomically
    /// with respect to concurrent commits. Implementations apply
    /// [`crate::progress::reconcile_scope`] under their write lock.
    async fn reconcile(&self, user: &UserId, subject: &SubjectId) -> Result<ReconcileReport>;
}
