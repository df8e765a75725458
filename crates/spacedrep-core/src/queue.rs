//! Review session selection and ordering.
//!
//! A session is due reviews first, most overdue first, followed by new
//! cards. New cards never take more than their share of the session; that
//! share is reserved for them even when reviews could fill every slot.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::model::{CardId, Phase, ScheduledCard, SubjectId, UserId};
use crate::store::CardStore;

/// Parameters of one `GetSession` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub user_id: UserId,
    /// Restrict to one subject; `None` means all of the user's subjects.
    #[serde(default)]
    pub subject: Option<SubjectId>,
    pub max_size: usize,
    /// Largest share of `max_size` new cards may take.
    pub new_card_ratio: f64,
}

impl SessionRequest {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.new_card_ratio) {
            return Err(SchedulerError::InvalidRequest(format!(
                "new_card_ratio must be between 0.0 and 1.0, got {}",
                self.new_card_ratio
            )));
        }
        Ok(())
    }

    /// Most new cards one session may hold.
    fn new_card_quota(&self) -> usize {
        ((self.max_size as f64 * self.new_card_ratio).floor() as usize).min(self.max_size)
    }
}

/// Read candidates from the store and order them into a session.
///
/// Read-only; safe to cancel at any point.
pub async fn build_session(
    store: &dyn CardStore,
    request: &SessionRequest,
    now: DateTime<Utc>,
) -> Result<Vec<CardId>> {
    request.validate()?;
    if request.max_size == 0 {
        return Ok(Vec::new());
    }

    let subject = request.subject.as_ref();
    let due = store.get_due(&request.user_id, subject, now).await?;
    let new = store.get_new(&request.user_id, subject).await?;

    Ok(plan_session(due, new, now, request))
}

/// Order already-fetched candidates into a session.
pub fn plan_session(
    due: Vec<ScheduledCard>,
    new: Vec<ScheduledCard>,
    now: DateTime<Utc>,
    request: &SessionRequest,
) -> Vec<CardId> {
    let mut seen = HashSet::new();
    let mut due: Vec<ScheduledCard> = due
        .into_iter()
        .filter(|c| c.state.phase != Phase::New && c.state.is_due(now))
        .filter(|c| seen.insert(c.card.id))
        .collect();
    let mut new: Vec<ScheduledCard> = new
        .into_iter()
        .filter(|c| c.state.phase == Phase::New)
        .filter(|c| seen.insert(c.card.id))
        .collect();

    // Most overdue first; harder cards first among equals.
    due.sort_by(|a, b| {
        a.state
            .due_at
            .cmp(&b.state.due_at)
            .then(a.state.ease_factor.total_cmp(&b.state.ease_factor))
            .then(a.card.id.cmp(&b.card.id))
    });
    new.sort_by(|a, b| {
        a.card
            .created_at
            .cmp(&b.card.created_at)
            .then(a.card.id.cmp(&b.card.id))
    });

    let new_take = request.new_card_quota().min(new.len());
    let due_take = due.len().min(request.max_size - new_take);

    due.iter()
        .take(due_take)
        .chain(new.iter().take(new_take))
        .map(|c| c.card.id)
        .collect()
}
