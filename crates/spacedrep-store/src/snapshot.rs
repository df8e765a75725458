//! The complete persisted state of a store.
//!
//! Every backend keeps one [`Snapshot`] and applies the methods below to it.
//! Mutating methods check everything that can fail before touching any
//! field, so an error leaves the snapshot unchanged.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spacedrep_core::model::{
    Attempt, Card, CardId, Phase, ScheduleState, ScheduledCard, SubjectId, UserId, Versioned,
};
use spacedrep_core::progress::{reconcile_scope, ProgressLedger, ProgressSnapshot, ReconcileReport};
use spacedrep_core::store::{ProgressView, ReviewCommit};
use spacedrep_core::{Result, SchedulerError};

/// A card with its schedule and the schedule's version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCard {
    pub card: Card,
    pub state: ScheduleState,
    pub version: u64,
}

/// Cards, schedules, the attempt log and per-user progress ledgers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub cards: BTreeMap<CardId, StoredCard>,
    /// Append-only.
    #[serde(default)]
    pub attempts: Vec<Attempt>,
    #[serde(default)]
    pub ledgers: BTreeMap<UserId, ProgressLedger>,
}

impl Snapshot {
    pub fn insert_card(&mut self, card: Card, state: ScheduleState) -> Result<()> {
        if self.cards.contains_key(&card.id) {
            return Err(SchedulerError::InvalidRequest(format!(
                "card {} already exists",
                card.id
            )));
        }
        self.cards.insert(
            card.id,
            StoredCard {
                card,
                state,
                version: 0,
            },
        );
        Ok(())
    }

    pub fn get_card(&self, card_id: CardId) -> Result<Card> {
        self.stored(card_id).map(|s| s.card.clone())
    }

    pub fn delete_card(&mut self, card_id: CardId) -> Result<()> {
        let removed = self
            .cards
            .remove(&card_id)
            .ok_or(SchedulerError::UnknownCard(card_id))?;
        if let Some(ledger) = self.ledgers.get_mut(&removed.card.user_id) {
            ledger.remove_card(card_id);
        }
        Ok(())
    }

    /// The user's cards in creation order.
    pub fn list_cards(&self, user: &UserId, subject: Option<&SubjectId>) -> Vec<ScheduledCard> {
        let mut cards: Vec<ScheduledCard> = self
            .scope(user, subject)
            .map(|s| ScheduledCard {
                card: s.card.clone(),
                state: s.state.clone(),
            })
            .collect();
        cards.sort_by(|a, b| {
            a.card
                .created_at
                .cmp(&b.card.created_at)
                .then(a.card.id.cmp(&b.card.id))
        });
        cards
    }

    pub fn subjects(&self, user: &UserId) -> Vec<SubjectId> {
        let from_cards = self.scope(user, None).map(|s| s.card.subject_id.clone());
        let from_log = self
            .attempts
            .iter()
            .filter(|a| &a.user_id == user)
            .map(|a| a.subject_id.clone());
        from_cards
            .chain(from_log)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn get_due(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
        before: DateTime<Utc>,
    ) -> Vec<ScheduledCard> {
        self.list_cards(user, subject)
            .into_iter()
            .filter(|c| c.state.phase != Phase::New && c.state.due_at <= before)
            .collect()
    }

    pub fn get_new(&self, user: &UserId, subject: Option<&SubjectId>) -> Vec<ScheduledCard> {
        self.list_cards(user, subject)
            .into_iter()
            .filter(|c| c.state.phase == Phase::New)
            .collect()
    }

    pub fn get_state(&self, card_id: CardId) -> Result<Versioned<ScheduleState>> {
        self.stored(card_id).map(|s| Versioned {
            data: s.state.clone(),
            version: s.version,
        })
    }

    /// Compare-and-swap the schedule, append the attempt, bump the counters.
    pub fn commit_review(&mut self, commit: ReviewCommit) -> Result<ProgressSnapshot> {
        let card_id = commit.attempt.card_id;
        let stored = self
            .cards
            .get_mut(&card_id)
            .ok_or(SchedulerError::UnknownCard(card_id))?;
        if stored.version != commit.expected_version {
            return Err(SchedulerError::ConcurrentModification {
                card_id,
                expected: commit.expected_version,
                actual: stored.version,
            });
        }

        stored.state = commit.state;
        stored.version += 1;
        Ok(self.record(commit.attempt))
    }

    /// Append an attempt that leaves the schedule alone.
    pub fn append_attempt(&mut self, attempt: Attempt) -> Result<ProgressSnapshot> {
        self.stored(attempt.card_id)?;
        Ok(self.record(attempt))
    }

    pub fn attempts(&self, user: &UserId, subject: Option<&SubjectId>) -> Vec<Attempt> {
        self.attempts
            .iter()
            .filter(|a| &a.user_id == user && subject.map_or(true, |s| &a.subject_id == s))
            .cloned()
            .collect()
    }

    pub fn ledger(&self, user: &UserId) -> ProgressLedger {
        self.ledgers.get(user).cloned().unwrap_or_default()
    }

    pub fn progress_view(&self, user: &UserId, subject: &SubjectId) -> ProgressView {
        ProgressView {
            cards: self.list_cards(user, Some(subject)),
            attempts: self.attempts(user, Some(subject)),
            ledger: self.ledger(user),
        }
    }

    pub fn reconcile(&mut self, user: &UserId, subject: &SubjectId) -> Result<ReconcileReport> {
        let cards: Vec<CardId> = self.scope(user, Some(subject)).map(|s| s.card.id).collect();
        let attempts = self.attempts(user, Some(subject));
        let mut ledger = self.ledger(user);
        let report = reconcile_scope(&mut ledger, &attempts, user, subject, &cards)?;
        self.ledgers.insert(user.clone(), ledger);
        Ok(report)
    }

    fn record(&mut self, attempt: Attempt) -> ProgressSnapshot {
        let snapshot = self
            .ledgers
            .entry(attempt.user_id.clone())
            .or_default()
            .apply(&attempt);
        self.attempts.push(attempt);
        snapshot
    }

    fn stored(&self, card_id: CardId) -> Result<&StoredCard> {
        self.cards
            .get(&card_id)
            .ok_or(SchedulerError::UnknownCard(card_id))
    }

    fn scope<'a>(
        &'a self,
        user: &'a UserId,
        subject: Option<&'a SubjectId>,
    ) -> impl Iterator<Item = &'a StoredCard> + 'a {
        self.cards.values().filter(move |s| {
            &s.card.user_id == user && subject.map_or(true, |subj| &s.card.subject_id == subj)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use spacedrep_core::engine::SchedulingPolicy;
    use spacedrep_core::model::{CardKind, PhaseTransition, Quality};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn card(user: &str, subject: &str) -> Card {
        Card {
            id: CardId::new(),
            user_id: user.into(),
            subject_id: subject.into(),
            kind: CardKind::Flashcard,
            question: "q".into(),
            answer: "a".into(),
            options: None,
            source: None,
            created_at: now(),
        }
    }

    fn attempt(card: &Card, correct: bool) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            card_id: card.id,
            user_id: card.user_id.clone(),
            subject_id: card.subject_id.clone(),
            reviewed_at: now(),
            quality: Quality::new(if correct { 5 } else { 1 }).unwrap(),
            correct,
            transition: None,
        }
    }

    fn commit(snapshot: &Snapshot, card: &Card, expected_version: u64) -> ReviewCommit {
        let current = snapshot.get_state(card.id).unwrap();
        let state = SchedulingPolicy::default().advance(
            &current.data,
            Quality::new(5).unwrap().into(),
            now(),
        );
        let mut attempt = attempt(card, true);
        attempt.transition = Some(PhaseTransition {
            from: current.data.phase,
            to: state.phase,
        });
        ReviewCommit {
            expected_version,
            state,
            attempt,
        }
    }

    #[test]
    fn commit_bumps_version_and_counters() {
        let mut snap = Snapshot::default();
        let c = card("ana", "Biology");
        snap.insert_card(c.clone(), ScheduleState::new(2.5, now()))
            .unwrap();

        let progress = snap.commit_review(commit(&snap, &c, 0)).unwrap();
        assert_eq!(progress.card.attempts_count, 1);
        assert_eq!(progress.subject.correct_count, 1);
        assert_eq!(snap.get_state(c.id).unwrap().version, 1);
        assert_eq!(snap.get_state(c.id).unwrap().data.phase, Phase::Learning);
        assert_eq!(snap.attempts.len(), 1);
    }

    #[test]
    fn stale_commit_changes_nothing() {
        let mut snap = Snapshot::default();
        let c = card("ana", "Biology");
        snap.insert_card(c.clone(), ScheduleState::new(2.5, now()))
            .unwrap();
        let first = commit(&snap, &c, 0);
        let second = commit(&snap, &c, 0);
        snap.commit_review(first).unwrap();

        let before = snap.clone();
        let err = snap.commit_review(second).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::ConcurrentModification {
                expected: 0,
                actual: 1,
                ..
            }
        ));
        assert_eq!(snap, before);
    }

    #[test]
    fn due_and_new_partition_cards() {
        let mut snap = Snapshot::default();
        let fresh = card("ana", "Biology");
        let reviewed = card("ana", "Biology");
        let later = card("ana", "Biology");
        let other_user = card("ben", "Biology");
        snap.insert_card(fresh.clone(), ScheduleState::new(2.5, now()))
            .unwrap();
        for (c, due) in [(&reviewed, now() - Duration::days(1)), (&later, now() + Duration::days(3))] {
            let mut state = ScheduleState::new(2.5, now());
            state.phase = Phase::Review;
            state.due_at = due;
            snap.insert_card(c.clone(), state).unwrap();
        }
        snap.insert_card(other_user, ScheduleState::new(2.5, now()))
            .unwrap();

        let user: UserId = "ana".into();
        let due = snap.get_due(&user, None, now());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].card.id, reviewed.id);
        let new = snap.get_new(&user, Some(&"Biology".into()));
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].card.id, fresh.id);
        assert!(snap.get_new(&user, Some(&"History".into())).is_empty());
    }

    #[test]
    fn delete_keeps_attempts_for_subject() {
        let mut snap = Snapshot::default();
        let a = card("ana", "Biology");
        let b = card("ana", "Biology");
        for c in [&a, &b] {
            snap.insert_card(c.clone(), ScheduleState::new(2.5, now()))
                .unwrap();
        }
        snap.append_attempt(attempt(&a, true)).unwrap();
        snap.append_attempt(attempt(&b, false)).unwrap();

        snap.delete_card(a.id).unwrap();
        let user: UserId = "ana".into();
        let ledger = snap.ledger(&user);
        assert_eq!(ledger.card(a.id).attempts_count, 0);
        assert_eq!(ledger.subject(&"Biology".into()).attempts_count, 2);
        assert_eq!(snap.attempts(&user, None).len(), 2);
        assert!(matches!(
            snap.get_card(a.id),
            Err(SchedulerError::UnknownCard(_))
        ));
        assert!(matches!(
            snap.append_attempt(attempt(&a, true)),
            Err(SchedulerError::UnknownCard(_))
        ));
        // Reconciling keeps the deleted card's attempts in the subject rollup.
        let report = snap.reconcile(&user, &"Biology".into()).unwrap();
        assert!(!report.drifted());
        assert_eq!(report.subject_progress.attempts_count, 2);
    }

    #[test]
    fn subjects_include_log_only_subjects() {
        let mut snap = Snapshot::default();
        let a = card("ana", "Chemistry");
        snap.insert_card(a.clone(), ScheduleState::new(2.5, now()))
            .unwrap();
        snap.append_attempt(attempt(&a, true)).unwrap();
        snap.insert_card(card("ana", "Biology"), ScheduleState::new(2.5, now()))
            .unwrap();
        snap.delete_card(a.id).unwrap();

        let subjects = snap.subjects(&"ana".into());
        assert_eq!(subjects, vec![SubjectId::from("Biology"), "Chemistry".into()]);
        assert!(snap.subjects(&"ben".into()).is_empty());
    }

    #[test]
    fn reconcile_unknown_scope() {
        let mut snap = Snapshot::default();
        let err = snap
            .reconcile(&"ana".into(), &"Biology".into())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownScope { .. }));
        assert!(snap.ledgers.is_empty());
    }

    #[test]
    fn progress_view_covers_one_scope() {
        let mut snap = Snapshot::default();
        let bio = card("ana", "Biology");
        let history = card("ana", "History");
        let other_user = card("ben", "Biology");
        for c in [&bio, &history, &other_user] {
            snap.insert_card(c.clone(), ScheduleState::new(2.5, now()))
                .unwrap();
            snap.commit_review(commit(&snap, c, 0)).unwrap();
        }

        let view = snap.progress_view(&"ana".into(), &"Biology".into());
        assert_eq!(view.cards.len(), 1);
        assert_eq!(view.cards[0].card.id, bio.id);
        assert_eq!(view.attempts.len(), 1);
        assert_eq!(view.attempts[0].card_id, bio.id);
        assert_eq!(view.ledger, snap.ledger(&"ana".into()));
        assert_eq!(view.ledger.subject(&"History".into()).attempts_count, 1);
    }

    #[test]
    fn snapshot_json_keys_are_strings() {
        let mut snap = Snapshot::default();
        let c = card("ana", "Biology");
        snap.insert_card(c.clone(), ScheduleState::new(2.5, now()))
            .unwrap();
        snap.append_attempt(attempt(&c, true)).unwrap();

        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
