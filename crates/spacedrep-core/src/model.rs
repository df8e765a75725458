//! Core data model types for spacedrep.
//!
//! These are the fundamental types that the entire spacedrep system uses to
//! represent cards, their schedules, review attempts, and progress counters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub Uuid);

impl CardId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CardId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(CardId)
    }
}

/// An already-authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// A subject (deck) name, unique per user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(UserId);
string_id!(SubjectId);

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// The presentation style of a card. Opaque to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    #[default]
    Flashcard,
    ShortAnswer,
    FillInBlank,
    MultipleChoice,
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardKind::Flashcard => write!(f, "flashcard"),
            CardKind::ShortAnswer => write!(f, "short_answer"),
            CardKind::FillInBlank => write!(f, "fill_in_blank"),
            CardKind::MultipleChoice => write!(f, "multiple_choice"),
        }
    }
}

impl FromStr for CardKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "flashcard" | "basic" => Ok(CardKind::Flashcard),
            "short_answer" => Ok(CardKind::ShortAnswer),
            "fill_in_blank" | "cloze" => Ok(CardKind::FillInBlank),
            "multiple_choice" | "mcq" => Ok(CardKind::MultipleChoice),
            other => Err(format!("unknown card kind: {other}")),
        }
    }
}

/// Where a generated card came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSource {
    /// Source document name.
    pub document: String,
    /// Page within the document.
    #[serde(default)]
    pub page: Option<u32>,
}

/// A unit of study content owned by one user and filed under one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub kind: CardKind,
    pub question: String,
    pub answer: String,
    /// Answer choices for multiple-choice cards.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<CardSource>,
    pub created_at: DateTime<Utc>,
}

/// Content for a card that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    pub subject_id: SubjectId,
    #[serde(default)]
    pub kind: CardKind,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<CardSource>,
}

impl NewCard {
    /// Materialize this content as a card owned by `user_id`.
    pub fn into_card(self, user_id: UserId, now: DateTime<Utc>) -> Card {
        Card {
            id: CardId::new(),
            user_id,
            subject_id: self.subject_id,
            kind: self.kind,
            question: self.question,
            answer: self.answer,
            options: self.options,
            source: self.source,
            created_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduling state
// ---------------------------------------------------------------------------

/// Learning phase of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    New,
    Learning,
    Review,
    Relearning,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::New => write!(f, "new"),
            Phase::Learning => write!(f, "learning"),
            Phase::Review => write!(f, "review"),
            Phase::Relearning => write!(f, "relearning"),
        }
    }
}

/// Per-card scheduling state. Mutated only by the scheduling engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetition_count: u32,
    pub due_at: DateTime<Utc>,
    pub phase: Phase,
    /// Number of lapses over the card's lifetime.
    #[serde(default)]
    pub lapse_count: u32,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl ScheduleState {
    /// State of a freshly created card: due immediately, never reviewed.
    pub fn new(initial_ease: f64, now: DateTime<Utc>) -> Self {
        Self {
            ease_factor: initial_ease,
            interval_days: 0,
            repetition_count: 0,
            due_at: now,
            phase: Phase::New,
            lapse_count: 0,
            last_reviewed_at: None,
        }
    }

    /// How long past due the card is at `now`. Negative when not yet due.
    pub fn overdue_by(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.due_at
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

/// A value tagged with the store version it was read at.
///
/// Writers hand the version back on commit; a mismatch means someone else
/// committed in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

/// A card together with its current schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCard {
    pub card: Card,
    pub state: ScheduleState,
}

// ---------------------------------------------------------------------------
// Review outcomes
// ---------------------------------------------------------------------------

/// A validated 0–5 quality signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    /// Validate a raw quality value. Out-of-range input is rejected, never clamped.
    pub fn new(raw: i64) -> Result<Self> {
        if (0..=Self::MAX as i64).contains(&raw) {
            Ok(Self(raw as u8))
        } else {
            Err(SchedulerError::InvalidQuality(raw))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Every valid quality, lowest first.
    pub fn all() -> impl Iterator<Item = Quality> {
        (0..=Self::MAX).map(Quality)
    }
}

impl TryFrom<i64> for Quality {
    type Error = SchedulerError;

    fn try_from(raw: i64) -> Result<Self> {
        Quality::new(raw)
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> u8 {
        q.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The outcome of presenting a card once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub quality: Quality,
}

impl From<Quality> for ReviewOutcome {
    fn from(quality: Quality) -> Self {
        Self { quality }
    }
}

// ---------------------------------------------------------------------------
// Attempts and aggregates
// ---------------------------------------------------------------------------

/// Phase change caused by one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
}

/// Immutable log record of one review event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub card_id: CardId,
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub reviewed_at: DateTime<Utc>,
    pub quality: Quality,
    /// Whether the quality met the passing threshold.
    pub correct: bool,
    /// `None` for graded attempts that did not reschedule the card.
    #[serde(default)]
    pub transition: Option<PhaseTransition>,
}

/// Attempt and correctness counters for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressAggregate {
    pub attempts_count: u64,
    pub correct_count: u64,
}

impl ProgressAggregate {
    /// Fraction of attempts graded correct; 0 when there are none.
    pub fn accuracy(&self) -> f64 {
        if self.attempts_count == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.attempts_count as f64
        }
    }

    pub fn record(&mut self, correct: bool) {
        self.attempts_count += 1;
        if correct {
            self.correct_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_rejects_out_of_range() {
        assert!(Quality::new(0).is_ok());
        assert!(Quality::new(5).is_ok());
        assert!(matches!(
            Quality::new(6),
            Err(SchedulerError::InvalidQuality(6))
        ));
        assert!(matches!(
            Quality::new(-1),
            Err(SchedulerError::InvalidQuality(-1))
        ));
    }

    #[test]
    fn quality_deserialize_validates() {
        let q: Quality = serde_json::from_str("4").unwrap();
        assert_eq!(q.value(), 4);
        assert!(serde_json::from_str::<Quality>("9").is_err());
    }

    #[test]
    fn card_kind_display_and_parse() {
        assert_eq!(CardKind::MultipleChoice.to_string(), "multiple_choice");
        assert_eq!("mcq".parse::<CardKind>().unwrap(), CardKind::MultipleChoice);
        assert_eq!(
            "fill-in-blank".parse::<CardKind>().unwrap(),
            CardKind::FillInBlank
        );
        assert_eq!("Flashcard".parse::<CardKind>().unwrap(), CardKind::Flashcard);
        assert!("essay".parse::<CardKind>().is_err());
    }

    #[test]
    fn accuracy_is_zero_without_attempts() {
        let agg = ProgressAggregate::default();
        assert_eq!(agg.accuracy(), 0.0);
    }

    #[test]
    fn accuracy_tracks_record() {
        let mut agg = ProgressAggregate::default();
        agg.record(true);
        agg.record(false);
        agg.record(true);
        agg.record(true);
        assert_eq!(agg.attempts_count, 4);
        assert_eq!(agg.correct_count, 3);
        assert!((agg.accuracy() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn new_state_is_due_immediately() {
        let now = Utc::now();
        let state = ScheduleState::new(2.5, now);
        assert_eq!(state.phase, Phase::New);
        assert_eq!(state.interval_days, 0);
        assert!(state.is_due(now));
    }

    #[test]
    fn card_id_parse() {
        let id = CardId::new();
        let parsed: CardId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<CardId>().is_err());
    }
}
