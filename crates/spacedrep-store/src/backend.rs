//! Snapshot-backed `CardStore`.
//!
//! [`SnapshotStore`] turns every store operation into either a read of the
//! current [`Snapshot`] or an atomic read-modify-write of it. A [`Backend`]
//! decides where the snapshot lives and how writers are serialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use spacedrep_core::model::{
    Attempt, Card, CardId, ScheduleState, ScheduledCard, SubjectId, UserId, Versioned,
};
use spacedrep_core::progress::{ProgressLedger, ProgressSnapshot, ReconcileReport};
use spacedrep_core::store::{CardStore, ProgressView, ReviewCommit};
use spacedrep_core::Result;

use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// Where a snapshot lives.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Run `f` over the current snapshot.
    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Result<T, StoreError>;

    /// Apply `f` to the current snapshot as one unit. Writers are serialized,
    /// `f` always sees every earlier write, and nothing is kept when it fails.
    fn write<T>(&self, f: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T>;
}

/// A card store over a [`Backend`].
pub struct SnapshotStore<B> {
    backend: B,
}

impl<B: Backend> SnapshotStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.backend.read(Snapshot::clone)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Result<T> {
        Ok(self.backend.read(f)?)
    }
}

#[async_trait]
impl<B: Backend> CardStore for SnapshotStore<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn insert_card(&self, card: Card, state: ScheduleState) -> Result<()> {
        self.backend.write(|s| s.insert_card(card, state))
    }

    async fn get_card(&self, card_id: CardId) -> Result<Card> {
        self.read(|s| s.get_card(card_id))?
    }

    async fn delete_card(&self, card_id: CardId) -> Result<()> {
        self.backend.write(|s| s.delete_card(card_id))
    }

    async fn list_cards(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
    ) -> Result<Vec<ScheduledCard>> {
        self.read(|s| s.list_cards(user, subject))
    }

    async fn subjects(&self, user: &UserId) -> Result<Vec<SubjectId>> {
        self.read(|s| s.subjects(user))
    }

    async fn get_due(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
        before: DateTime<Utc>,
    ) -> Result<Vec<ScheduledCard>> {
        self.read(|s| s.get_due(user, subject, before))
    }

    async fn get_new(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
    ) -> Result<Vec<ScheduledCard>> {
        self.read(|s| s.get_new(user, subject))
    }

    async fn get_state(&self, card_id: CardId) -> Result<Versioned<ScheduleState>> {
        self.read(|s| s.get_state(card_id))?
    }

    async fn commit_review(&self, commit: ReviewCommit) -> Result<ProgressSnapshot> {
        self.backend.write(|s| s.commit_review(commit))
    }

    async fn append_attempt(&self, attempt: Attempt) -> Result<ProgressSnapshot> {
        self.backend.write(|s| s.append_attempt(attempt))
    }

    async fn attempts(&self, user: &UserId, subject: Option<&SubjectId>) -> Result<Vec<Attempt>> {
        self.read(|s| s.attempts(user, subject))
    }

    async fn ledger(&self, user: &UserId) -> Result<ProgressLedger> {
        self.read(|s| s.ledger(user))
    }

    async fn progress_view(&self, user: &UserId, subject: &SubjectId) -> Result<ProgressView> {
        self.read(|s| s.progress_view(user, subject))
    }

    async fn reconcile(&self, user: &UserId, subject: &SubjectId) -> Result<ReconcileReport> {
        self.backend.write(|s| s.reconcile(user, subject))
    }
}
