//! Scheduler service.
//!
//! The facade callers talk to. Wires the clock, the card store, the
//! scheduling engine, the queue builder and the progress aggregator together.
//! Every store call is bounded by a timeout; expiry surfaces as
//! [`SchedulerError::StorageUnavailable`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::engine::{IntervalPreview, SchedulingPolicy};
use crate::error::{Result, SchedulerError};
use crate::grading::{Grade, GradingPolicy, QualityMapping};
use crate::model::{
    Attempt, Card, CardId, NewCard, PhaseTransition, ProgressAggregate, Quality, ScheduleState,
    ScheduledCard, SubjectId, UserId,
};
use crate::progress::{
    scope_drifted, CardProgress, ProgressReport, ProgressSummary, ReconcileReport,
    SubjectProgress,
};
use crate::queue::{build_session, SessionRequest};
use crate::store::{CardStore, ReviewCommit};

/// Configuration for the scheduler service.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub policy: SchedulingPolicy,
    pub grading: QualityMapping,
    /// Upper bound on any single store call.
    pub storage_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::default(),
            grading: QualityMapping::default(),
            storage_timeout: Duration::from_millis(5000),
        }
    }
}

/// Result of `SubmitReview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReceipt {
    pub card_id: CardId,
    pub state: ScheduleState,
    pub transition: PhaseTransition,
    pub card_progress: ProgressAggregate,
    pub subject_progress: ProgressAggregate,
}

/// Result of grading and recording a quiz answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub card_id: CardId,
    pub grade: Grade,
    pub quality: Quality,
    pub expected_answer: String,
    pub card_progress: ProgressAggregate,
    pub subject_progress: ProgressAggregate,
}

/// The spaced-repetition scheduler.
pub struct Scheduler {
    store: Arc<dyn CardStore>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler, rejecting unusable policy constants.
    pub fn new(
        store: Arc<dyn CardStore>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.policy.validate()?;
        config.grading.validate(&config.policy)?;
        Ok(Self {
            store,
            clock,
            config,
        })
    }

    /// Create a scheduler on wall-clock time.
    pub fn with_system_clock(store: Arc<dyn CardStore>, config: SchedulerConfig) -> Result<Self> {
        Self::new(store, Arc::new(SystemClock), config)
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.config.policy
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    async fn storage<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        with_timeout(self.config.storage_timeout, op, fut).await
    }

    /// Store a new card with a fresh schedule.
    pub async fn add_card(&self, user: &UserId, new_card: NewCard) -> Result<Card> {
        if new_card.question.trim().is_empty() {
            return Err(SchedulerError::InvalidRequest("card question is empty".into()));
        }
        if new_card.subject_id.as_str().trim().is_empty() {
            return Err(SchedulerError::InvalidRequest("card subject is empty".into()));
        }

        let now = self.clock.now();
        let card = new_card.into_card(user.clone(), now);
        let state = ScheduleState::new(self.config.policy.initial_ease, now);
        self.storage("insert_card", self.store.insert_card(card.clone(), state))
            .await?;

        tracing::debug!(user = %user, card = %card.id, subject = %card.subject_id, "card added");
        Ok(card)
    }

    /// Fetch one of the user's cards with its schedule.
    pub async fn get_card(&self, user: &UserId, card_id: CardId) -> Result<ScheduledCard> {
        let card = self.owned_card(user, card_id).await?;
        let state = self.storage("get_state", self.store.get_state(card_id)).await?;
        Ok(ScheduledCard {
            card,
            state: state.data,
        })
    }

    /// Delete one of the user's cards. Its attempts stay in the log.
    pub async fn delete_card(&self, user: &UserId, card_id: CardId) -> Result<()> {
        self.owned_card(user, card_id).await?;
        self.storage("delete_card", self.store.delete_card(card_id))
            .await?;
        tracing::info!(user = %user, card = %card_id, "card deleted");
        Ok(())
    }

    /// `GetSession`: the ordered card ids for one sitting.
    pub async fn get_session(&self, request: &SessionRequest) -> Result<Vec<CardId>> {
        let now = self.clock.now();
        let session = self
            .storage("build_session", build_session(self.store.as_ref(), request, now))
            .await?;
        tracing::info!(
            user = %request.user_id,
            subject = ?request.subject.as_ref().map(SubjectId::as_str),
            size = session.len(),
            "session built"
        );
        Ok(session)
    }

    /// `SubmitReview`: advance the card's schedule and record the attempt.
    ///
    /// The quality is validated before anything is read or written. A
    /// concurrent submission for the same card that commits first makes this
    /// one fail with `ConcurrentModification`; nothing is written in that case.
    pub async fn submit_review(
        &self,
        user: &UserId,
        card_id: CardId,
        quality: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<ReviewReceipt> {
        let quality = Quality::new(quality)?;
        let now = at.unwrap_or_else(|| self.clock.now());

        let card = self.owned_card(user, card_id).await?;
        let current = self.storage("get_state", self.store.get_state(card_id)).await?;

        let policy = &self.config.policy;
        let next = policy.advance(&current.data, quality.into(), now);
        let transition = PhaseTransition {
            from: current.data.phase,
            to: next.phase,
        };
        let attempt = Attempt {
            id: Uuid::new_v4(),
            card_id,
            user_id: user.clone(),
            subject_id: card.subject_id.clone(),
            reviewed_at: now,
            quality,
            correct: policy.is_pass(quality),
            transition: Some(transition),
        };

        let commit = ReviewCommit {
            expected_version: current.version,
            state: next.clone(),
            attempt,
        };
        let snapshot = match self.storage("commit_review", self.store.commit_review(commit)).await {
            Ok(snapshot) => snapshot,
            Err(e @ SchedulerError::ConcurrentModification { .. }) => {
                tracing::warn!(card = %card_id, "review rejected: {e}");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            card = %card_id,
            quality = quality.value(),
            from = %transition.from,
            to = %transition.to,
            interval_days = next.interval_days,
            "review committed"
        );

        Ok(ReviewReceipt {
            card_id,
            state: next,
            transition,
            card_progress: snapshot.card,
            subject_progress: snapshot.subject,
        })
    }

    /// Record a graded attempt that does not reschedule the card.
    pub async fn record_attempt(
        &self,
        user: &UserId,
        card_id: CardId,
        quality: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<(ProgressAggregate, ProgressAggregate)> {
        let quality = Quality::new(quality)?;
        let card = self.owned_card(user, card_id).await?;
        let attempt = Attempt {
            id: Uuid::new_v4(),
            card_id,
            user_id: user.clone(),
            subject_id: card.subject_id,
            reviewed_at: at.unwrap_or_else(|| self.clock.now()),
            quality,
            correct: self.config.policy.is_pass(quality),
            transition: None,
        };
        let snapshot = self
            .storage("append_attempt", self.store.append_attempt(attempt))
            .await?;
        Ok((snapshot.card, snapshot.subject))
    }

    /// Grade a quiz answer and record it without rescheduling the card.
    pub async fn answer_quiz(
        &self,
        user: &UserId,
        card_id: CardId,
        response: &str,
        grader: &dyn GradingPolicy,
    ) -> Result<QuizOutcome> {
        let card = self.owned_card(user, card_id).await?;
        let grade = grader.grade(&card, response);
        let quality = self.config.grading.quality(grade)?;
        let (card_progress, subject_progress) = self
            .record_attempt(user, card_id, quality.value() as i64, None)
            .await?;

        Ok(QuizOutcome {
            card_id,
            grade,
            quality,
            expected_answer: card.answer,
            card_progress,
            subject_progress,
        })
    }

    /// `GetProgress`: per-subject rollups with per-card rows.
    ///
    /// Scopes whose counters disagree with the attempt log are reconciled
    /// before they are reported. A subject the user has never touched
    /// reports zeros.
    pub async fn get_progress(
        &self,
        user: &UserId,
        subject: Option<&SubjectId>,
    ) -> Result<ProgressReport> {
        let subjects = match subject {
            Some(s) => vec![s.clone()],
            None => self.storage("subjects", self.store.subjects(user)).await?,
        };

        let subjects = try_join_all(
            subjects
                .iter()
                .map(|subject| self.subject_progress(user, subject)),
        )
        .await?;

        let overall = subjects
            .iter()
            .fold(ProgressAggregate::default(), |acc, s| ProgressAggregate {
                attempts_count: acc.attempts_count + s.progress.attempts_count,
                correct_count: acc.correct_count + s.progress.correct_count,
            });

        Ok(ProgressReport {
            user_id: user.clone(),
            generated_at: self.clock.now(),
            overall: overall.into(),
            subjects,
        })
    }

    async fn subject_progress(&self, user: &UserId, subject: &SubjectId) -> Result<SubjectProgress> {
        let mut view = self
            .storage("progress_view", self.store.progress_view(user, subject))
            .await?;

        let card_ids: Vec<CardId> = view.cards.iter().map(|c| c.card.id).collect();
        if !card_ids.is_empty() && scope_drifted(&view.ledger, &view.attempts, subject, &card_ids) {
            self.reconcile(user, subject).await?;
            view = self
                .storage("progress_view", self.store.progress_view(user, subject))
                .await?;
        }
        let ledger = view.ledger;

        let cards = view
            .cards
            .into_iter()
            .map(|c| CardProgress {
                card_id: c.card.id,
                question: c.card.question,
                phase: c.state.phase,
                due_at: c.state.due_at,
                progress: ledger.card(c.card.id).into(),
            })
            .collect();

        Ok(SubjectProgress {
            subject_id: subject.clone(),
            progress: ProgressSummary::from(ledger.subject(subject)),
            cards,
        })
    }

    /// Rebuild a (user, subject) scope's counters from the attempt log.
    pub async fn reconcile(&self, user: &UserId, subject: &SubjectId) -> Result<ReconcileReport> {
        let report = self
            .storage("reconcile", self.store.reconcile(user, subject))
            .await?;
        if report.drifted() {
            tracing::warn!(
                user = %user,
                subject = %subject,
                cards_repaired = report.cards_repaired,
                subject_repaired = report.subject_repaired,
                "progress counters drifted and were rebuilt"
            );
        } else {
            tracing::debug!(user = %user, subject = %subject, "progress counters consistent");
        }
        Ok(report)
    }

    /// The interval each quality would give the card right now.
    pub async fn preview(&self, user: &UserId, card_id: CardId) -> Result<Vec<IntervalPreview>> {
        let scheduled = self.get_card(user, card_id).await?;
        Ok(self
            .config
            .policy
            .preview(&scheduled.state, self.clock.now()))
    }

    /// Load a card and check it belongs to `user`. Foreign cards look unknown.
    async fn owned_card(&self, user: &UserId, card_id: CardId) -> Result<Card> {
        let card = self.storage("get_card", self.store.get_card(card_id)).await?;
        if &card.user_id != user {
            return Err(SchedulerError::UnknownCard(card_id));
        }
        Ok(card)
    }
}

/// Run a store call with an upper time bound.
pub async fn with_timeout<T>(
    limit: Duration,
    op: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(op, timeout_ms = limit.as_millis() as u64, "storage call timed out");
            Err(SchedulerError::StorageUnavailable(format!(
                "{op} timed out after {}ms",
                limit.as_millis()
            )))
        }
    }
}
