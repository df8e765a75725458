//! Turning answers into quality signals.
//!
//! The engine only sees a 0–5 quality. How a typed or chosen answer becomes
//! that number is a caller policy: a [`GradingPolicy`] judges the answer and
//! a [`QualityMapping`] turns the verdict into a quality.

use serde::{Deserialize, Serialize};

use crate::engine::SchedulingPolicy;
use crate::error::{Result, SchedulerError};
use crate::model::{Card, CardKind, Quality};

/// Verdict on one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Correct,
    /// Right answer with a slip (formatting, punctuation, hesitation).
    Partial,
    Incorrect,
}

/// Quality assigned to each grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityMapping {
    pub correct: u8,
    pub partial: u8,
    pub incorrect: u8,
}

impl Default for QualityMapping {
    fn default() -> Self {
        Self {
            correct: 5,
            partial: 3,
            incorrect: 2,
        }
    }
}

impl QualityMapping {
    /// Check every grade maps to a valid quality on the right side of the
    /// policy's pass threshold.
    pub fn validate(&self, policy: &SchedulingPolicy) -> Result<()> {
        for raw in [self.correct, self.partial, self.incorrect] {
            Quality::new(raw as i64)?;
        }
        if self.correct < policy.pass_threshold || self.partial < policy.pass_threshold {
            return Err(SchedulerError::InvalidRequest(format!(
                "correct and partial grades must map to a passing quality (>= {})",
                policy.pass_threshold
            )));
        }
        if self.incorrect >= policy.pass_threshold {
            return Err(SchedulerError::InvalidRequest(format!(
                "incorrect grade must map below the pass threshold {}",
                policy.pass_threshold
            )));
        }
        Ok(())
    }

    pub fn quality(&self, grade: Grade) -> Result<Quality> {
        let raw = match grade {
            Grade::Correct => self.correct,
            Grade::Partial => self.partial,
            Grade::Incorrect => self.incorrect,
        };
        Quality::new(raw as i64)
    }
}

/// Judges a response against a card.
pub trait GradingPolicy: Send + Sync {
    fn grade(&self, card: &Card, response: &str) -> Grade;
}

/// Answer matching used by quiz mode.
///
/// Multiple-choice answers must match the chosen option exactly (ignoring
/// surrounding whitespace). Free-text answers match case-insensitively; an
/// answer that only differs in punctuation or spacing earns a partial grade.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnswerMatch;

impl GradingPolicy for AnswerMatch {
    fn grade(&self, card: &Card, response: &str) -> Grade {
        let expected = card.answer.trim();
        let given = response.trim();

        if card.kind == CardKind::MultipleChoice {
            return if given == expected {
                Grade::Correct
            } else {
                Grade::Incorrect
            };
        }

        if given.to_lowercase() == expected.to_lowercase() {
            Grade::Correct
        } else if !given.is_empty() && squash(given) == squash(expected) {
            Grade::Partial
        } else {
            Grade::Incorrect
        }
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
