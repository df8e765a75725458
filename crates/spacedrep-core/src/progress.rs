//! Progress aggregation over the attempt log.
//!
//! Aggregates are maintained incrementally on every recorded attempt and can
//! always be rebuilt by replaying the log. [`reconcile_scope`] is the repair
//! path for counters that drifted after a partial failure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::model::{Attempt, CardId, Phase, ProgressAggregate, SubjectId, UserId};

/// Aggregates touched by one recorded attempt, after the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub card: ProgressAggregate,
    pub subject: ProgressAggregate,
}

/// One user's maintained aggregates, keyed by subject and by card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressLedger {
    #[serde(default)]
    pub subjects: BTreeMap<SubjectId, ProgressAggregate>,
    #[serde(default)]
    pub cards: BTreeMap<CardId, ProgressAggregate>,
}

impl ProgressLedger {
    /// Fold one attempt into the card and subject counters.
    pub fn apply(&mut self, attempt: &Attempt) -> ProgressSnapshot {
        let card = self.cards.entry(attempt.card_id).or_default();
        card.record(attempt.correct);
        let card = *card;

        let subject = self
            .subjects
            .entry(attempt.subject_id.clone())
            .or_default();
        subject.record(attempt.correct);

        ProgressSnapshot {
            card,
            subject: *subject,
        }
    }

    /// Rebuild a ledger from scratch.
    pub fn replay<'a>(attempts: impl IntoIterator<Item = &'a Attempt>) -> Self {
        let mut ledger = Self::default();
        for attempt in attempts {
            ledger.apply(attempt);
        }
        ledger
    }

    pub fn card(&self, card_id: CardId) -> ProgressAggregate {
        self.cards.get(&card_id).copied().unwrap_or_default()
    }

    pub fn subject(&self, subject: &SubjectId) -> ProgressAggregate {
        self.subjects.get(subject).copied().unwrap_or_default()
    }

    /// Sum over every subject.
    pub fn total(&self) -> ProgressAggregate {
        self.subjects
            .values()
            .fold(ProgressAggregate::default(), |acc, s| ProgressAggregate {
                attempts_count: acc.attempts_count + s.attempts_count,
                correct_count: acc.correct_count + s.correct_count,
            })
    }

    pub fn remove_card(&mut self, card_id: CardId) {
        self.cards.remove(&card_id);
    }
}

/// Outcome of rebuilding one (user, subject) scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub cards_checked: usize,
    /// Card counters that disagreed with the log and were overwritten.
    pub cards_repaired: usize,
    pub subject_repaired: bool,
    /// Subject rollup after the rebuild.
    pub subject_progress: ProgressAggregate,
}

impl ReconcileReport {
    pub fn drifted(&self) -> bool {
        self.subject_repaired || self.cards_repaired > 0
    }
}

/// Counters a scope should hold according to the attempt log.
struct ExpectedScope {
    subject: ProgressAggregate,
    cards: BTreeMap<CardId, ProgressAggregate>,
}

fn expected_scope(attempts: &[Attempt], subject: &SubjectId, cards: &[CardId]) -> ExpectedScope {
    let mut expected = ExpectedScope {
        subject: ProgressAggregate::default(),
        cards: cards
            .iter()
            .map(|id| (*id, ProgressAggregate::default()))
            .collect(),
    };
    for attempt in attempts.iter().filter(|a| &a.subject_id == subject) {
        expected.subject.record(attempt.correct);
        // Deleted cards still count toward the subject.
        if let Some(card) = expected.cards.get_mut(&attempt.card_id) {
            card.record(attempt.correct);
        }
    }
    expected
}

/// Whether the ledger disagrees with the log anywhere in the scope.
pub fn scope_drifted(
    ledger: &ProgressLedger,
    attempts: &[Attempt],
    subject: &SubjectId,
    cards: &[CardId],
) -> bool {
    let expected = expected_scope(attempts, subject, cards);
    ledger.subject(subject) != expected.subject
        || expected
            .cards
            .iter()
            .any(|(id, agg)| ledger.card(*id) != *agg)
}

/// Overwrite the scope's counters with a straight replay of `attempts`.
///
/// `attempts` is the user's log (other subjects are ignored); `cards` are the
/// scope's live cards. Drift is repaired, not reported as an error; a scope
/// without cards is.
pub fn reconcile_scope(
    ledger: &mut ProgressLedger,
    attempts: &[Attempt],
    user: &UserId,
    subject: &SubjectId,
    cards: &[CardId],
) -> Result<ReconcileReport> {
    if cards.is_empty() {
        return Err(SchedulerError::UnknownScope {
            user: user.clone(),
            subject: subject.clone(),
        });
    }

    let expected = expected_scope(attempts, subject, cards);
    let mut cards_repaired = 0;
    for (card_id, agg) in &expected.cards {
        if ledger.card(*card_id) != *agg {
            cards_repaired += 1;
        }
        ledger.cards.insert(*card_id, *agg);
    }
    let subject_repaired = ledger.subject(subject) != expected.subject;
    ledger.subjects.insert(subject.clone(), expected.subject);

    Ok(ReconcileReport {
        user_id: user.clone(),
        subject_id: subject.clone(),
        cards_checked: expected.cards.len(),
        cards_repaired,
        subject_repaired,
        subject_progress: expected.subject,
    })
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Counters plus derived accuracy, as handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub attempts_count: u64,
    pub correct_count: u64,
    pub accuracy: f64,
}

impl From<ProgressAggregate> for ProgressSummary {
    fn from(agg: ProgressAggregate) -> Self {
        Self {
            attempts_count: agg.attempts_count,
            correct_count: agg.correct_count,
            accuracy: agg.accuracy(),
        }
    }
}

/// Per-card row of a progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardProgress {
    pub card_id: CardId,
    pub question: String,
    pub phase: Phase,
    pub due_at: DateTime<Utc>,
    pub progress: ProgressSummary,
}

/// One subject's rollup and its cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProgress {
    pub subject_id: SubjectId,
    pub progress: ProgressSummary,
    pub cards: Vec<CardProgress>,
}

/// Result of `GetProgress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub user_id: UserId,
    pub generated_at: DateTime<Utc>,
    /// Sum over the reported subjects.
    pub overall: ProgressSummary,
    pub subjects: Vec<SubjectProgress>,
}

impl ProgressReport {
    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**{}:** {} attempts, {} correct, {:.1}% accuracy\n\n",
            self.user_id,
            self.overall.attempts_count,
            self.overall.correct_count,
            self.overall.accuracy * 100.0
        ));

        for subject in &self.subjects {
            md.push_str(&format!(
                "### {} ({} attempts, {:.1}%)\n\n",
                subject.subject_id,
                subject.progress.attempts_count,
                subject.progress.accuracy * 100.0
            ));
            if subject.cards.is_empty() {
                md.push_str("_No cards._\n\n");
                continue;
            }
            md.push_str("| Card | Question | Phase | Attempts | Correct | Accuracy |\n");
            md.push_str("|------|----------|-------|----------|---------|----------|\n");
            for card in &subject.cards {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {:.1}% |\n",
                    card.card_id,
                    truncate(&card.question, 60).replace('|', "\\|"),
                    card.phase,
                    card.progress.attempts_count,
                    card.progress.correct_count,
                    card.progress.accuracy * 100.0
                ));
            }
            md.push('\n');
        }

        md
    }
}

/// Shorten `text` to at most `max` characters, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
