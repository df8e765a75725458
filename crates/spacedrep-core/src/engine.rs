//! SM-2-derived scheduling engine.
//!
//! Maps `(ScheduleState, ReviewOutcome, now)` to the next `ScheduleState`.
//! Pure and deterministic: no I/O, no shared state.
//!
//! Quality ratings (0-5):
//! - 0-2: lapse; the card goes back to relearning with a one-day interval
//! - 3: correct with serious difficulty
//! - 4: correct after hesitation
//! - 5: perfect recall

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::model::{Phase, Quality, ReviewOutcome, ScheduleState};

/// Tunable constants of the scheduling algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    /// Ease factor given to new cards.
    pub initial_ease: f64,
    /// Floor the ease factor never drops below.
    pub min_ease: f64,
    /// Lowest quality that counts as a pass.
    pub pass_threshold: u8,
    /// Interval after the first successful review.
    pub first_interval_days: u32,
    /// Interval after the second successful review.
    pub second_interval_days: u32,
    /// Interval after a lapse.
    pub lapse_interval_days: u32,
    /// Longest interval a pass can produce.
    pub max_interval_days: u32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            min_ease: 1.3,
            pass_threshold: 3,
            first_interval_days: 1,
            second_interval_days: 6,
            lapse_interval_days: 1,
            max_interval_days: 36500,
        }
    }
}

/// Interval a single quality would produce, for showing on answer buttons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalPreview {
    pub quality: Quality,
    pub interval_days: u32,
    pub due_at: DateTime<Utc>,
}

impl SchedulingPolicy {
    /// Check the constants are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_ease.is_finite() && self.min_ease > 0.0) {
            return Err(SchedulerError::InvalidRequest(format!(
                "min_ease must be positive, got {}",
                self.min_ease
            )));
        }
        if !self.initial_ease.is_finite() || self.initial_ease < self.min_ease {
            return Err(SchedulerError::InvalidRequest(format!(
                "initial_ease {} is below min_ease {}",
                self.initial_ease, self.min_ease
            )));
        }
        if self.pass_threshold == 0 || self.pass_threshold > Quality::MAX {
            return Err(SchedulerError::InvalidRequest(format!(
                "pass_threshold must be between 1 and {}, got {}",
                Quality::MAX,
                self.pass_threshold
            )));
        }
        if self.first_interval_days == 0 || self.lapse_interval_days == 0 {
            return Err(SchedulerError::InvalidRequest(
                "first and lapse intervals must be at least one day".into(),
            ));
        }
        if self.second_interval_days < self.first_interval_days {
            return Err(SchedulerError::InvalidRequest(format!(
                "second_interval_days {} is shorter than first_interval_days {}",
                self.second_interval_days, self.first_interval_days
            )));
        }
        if self.max_interval_days < self.second_interval_days
            || self.max_interval_days < self.lapse_interval_days
        {
            return Err(SchedulerError::InvalidRequest(format!(
                "max_interval_days {} is shorter than the fixed intervals",
                self.max_interval_days
            )));
        }
        Ok(())
    }

    pub fn is_pass(&self, quality: Quality) -> bool {
        quality.value() >= self.pass_threshold
    }

    /// EF' = max(floor, EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)))
    pub fn next_ease(&self, ease: f64, quality: Quality) -> f64 {
        let miss = (Quality::MAX - quality.value()) as f64;
        (ease + (0.1 - miss * (0.08 + miss * 0.02))).max(self.min_ease)
    }

    /// Compute the state after one review.
    pub fn advance(
        &self,
        state: &ScheduleState,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> ScheduleState {
        let quality = outcome.quality;
        let ease_factor = self.next_ease(state.ease_factor, quality);

        if !self.is_pass(quality) {
            return ScheduleState {
                ease_factor,
                interval_days: self.lapse_interval_days,
                repetition_count: 0,
                due_at: add_days(now, self.lapse_interval_days),
                phase: Phase::Relearning,
                lapse_count: state.lapse_count.saturating_add(1),
                last_reviewed_at: Some(now),
            };
        }

        let repetition_count = state.repetition_count.saturating_add(1);
        let interval_days = match repetition_count {
            1 => self.first_interval_days,
            2 => self.second_interval_days,
            // Grows from the ease the card had going into this review.
            _ => round_days(state.interval_days as f64 * state.ease_factor).max(1),
        }
        .min(self.max_interval_days);
        let phase = if repetition_count >= 2 {
            Phase::Review
        } else {
            Phase::Learning
        };
        // A pass never pulls the due date earlier.
        let due_at = add_days(now, interval_days).max(state.due_at);

        ScheduleState {
            ease_factor,
            interval_days,
            repetition_count,
            due_at,
            phase,
            lapse_count: state.lapse_count,
            last_reviewed_at: Some(now),
        }
    }

    /// The interval every possible quality would produce from `state`.
    pub fn preview(&self, state: &ScheduleState, now: DateTime<Utc>) -> Vec<IntervalPreview> {
        Quality::all()
            .map(|quality| {
                let next = self.advance(state, quality.into(), now);
                IntervalPreview {
                    quality,
                    interval_days: next.interval_days,
                    due_at: next.due_at,
                }
            })
            .collect()
    }
}

/// Advance `state` under the default policy.
pub fn advance(state: &ScheduleState, outcome: ReviewOutcome, now: DateTime<Utc>) -> ScheduleState {
    SchedulingPolicy::default().advance(state, outcome, now)
}

/// Round to the nearest whole day, ties up. Saturates at `u32::MAX`.
fn round_days(days: f64) -> u32 {
    // f64::round rounds half away from zero, which is "ties up" for positive values.
    days.round().clamp(0.0, u32::MAX as f64) as u32
}

/// `at` plus `days`, pinned to the latest representable instant on overflow.
fn add_days(at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    at.checked_add_signed(Duration::days(days as i64))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    fn q(raw: i64) -> ReviewOutcome {
        Quality::new(raw).unwrap().into()
    }

    #[test]
    fn default_policy_is_valid() {
        assert!(SchedulingPolicy::default().validate().is_ok());
    }

    #[test]
    fn invalid_policies_rejected() {
        let low_initial = SchedulingPolicy {
            initial_ease: 1.0,
            ..Default::default()
        };
        assert!(low_initial.validate().is_err());

        let bad_threshold = SchedulingPolicy {
            pass_threshold: 6,
            ..Default::default()
        };
        assert!(bad_threshold.validate().is_err());

        let zero_lapse = SchedulingPolicy {
            lapse_interval_days: 0,
            ..Default::default()
        };
        assert!(zero_lapse.validate().is_err());
    }

    #[test]
    fn review_then_lapse_scenario() {
        let fresh = ScheduleState::new(2.5, day(0));

        let s1 = advance(&fresh, q(5), day(0));
        assert_eq!(s1.repetition_count, 1);
        assert_eq!(s1.interval_days, 1);
        assert_eq!(s1.due_at, day(1));
        assert_eq!(s1.phase, Phase::Learning);

        let s2 = advance(&s1, q(5), day(1));
        assert_eq!(s2.repetition_count, 2);
        assert_eq!(s2.interval_days, 6);
        assert_eq!(s2.due_at, day(7));
        assert_eq!(s2.phase, Phase::Review);

        let s3 = advance(&s2, q(2), day(7));
        assert_eq!(s3.repetition_count, 0);
        assert_eq!(s3.interval_days, 1);
        assert_eq!(s3.phase, Phase::Relearning);
        assert_eq!(s3.due_at, day(8));
        assert_eq!(s3.lapse_count, 1);
        assert!(s3.ease_factor < s2.ease_factor);
    }

    #[test]
    fn third_pass_multiplies_previous_interval_by_prior_ease() {
        let state = ScheduleState {
            ease_factor: 2.5,
            interval_days: 10,
            repetition_count: 5,
            due_at: day(0),
            phase: Phase::Review,
            lapse_count: 0,
            last_reviewed_at: Some(day(-10)),
        };
        let next = advance(&state, q(4), day(0));
        assert_eq!(next.interval_days, 25);
        assert_eq!(next.due_at, day(25));
        // q=4 leaves ease unchanged.
        assert!((next.ease_factor - 2.5).abs() < 1e-9);
    }

    #[test]
    fn interval_rounds_ties_up() {
        let state = ScheduleState {
            ease_factor: 2.5,
            interval_days: 7,
            repetition_count: 3,
            due_at: day(0),
            phase: Phase::Review,
            lapse_count: 0,
            last_reviewed_at: None,
        };
        // 7 * 2.5 = 17.5
        assert_eq!(advance(&state, q(3), day(0)).interval_days, 18);
    }

    #[test]
    fn ease_adjustment_by_quality() {
        let policy = SchedulingPolicy::default();
        let e = |raw| policy.next_ease(2.5, Quality::new(raw).unwrap());
        assert!((e(5) - 2.6).abs() < 1e-9);
        assert!((e(4) - 2.5).abs() < 1e-9);
        assert!((e(3) - 2.36).abs() < 1e-9);
        assert!((e(2) - 2.18).abs() < 1e-9);
        assert!((e(0) - 1.7).abs() < 1e-9);
        assert!((policy.next_ease(1.35, Quality::new(0).unwrap()) - 1.3).abs() < 1e-9);
    }

    #[test]
    fn early_pass_keeps_due_date() {
        let state = ScheduleState {
            ease_factor: 1.3,
            interval_days: 1,
            repetition_count: 3,
            due_at: day(30),
            phase: Phase::Review,
            lapse_count: 0,
            last_reviewed_at: None,
        };
        let next = advance(&state, q(3), day(0));
        assert_eq!(next.due_at, day(30));
    }

    #[test]
    fn corrupted_zero_interval_lifts_to_one_day() {
        let state = ScheduleState {
            ease_factor: 2.5,
            interval_days: 0,
            repetition_count: 4,
            due_at: day(0),
            phase: Phase::Review,
            lapse_count: 0,
            last_reviewed_at: None,
        };
        assert_eq!(advance(&state, q(5), day(0)).interval_days, 1);
    }

    #[test]
    fn preview_covers_every_quality() {
        let fresh = ScheduleState::new(2.5, day(0));
        let preview = SchedulingPolicy::default().preview(&fresh, day(0));
        assert_eq!(preview.len(), 6);
        assert!(preview[..3].iter().all(|p| p.interval_days == 1));
        assert_eq!(preview[5].interval_days, 1);
    }

    #[test]
    fn custom_policy_constants_apply() {
        let policy = SchedulingPolicy {
            first_interval_days: 2,
            second_interval_days: 4,
            lapse_interval_days: 3,
            pass_threshold: 4,
            ..Default::default()
        };
        let fresh = ScheduleState::new(policy.initial_ease, day(0));
        let s1 = policy.advance(&fresh, q(4), day(0));
        assert_eq!(s1.interval_days, 2);
        let s2 = policy.advance(&s1, q(5), day(2));
        assert_eq!(s2.interval_days, 4);
        // 3 is a lapse under this policy.
        let s3 = policy.advance(&s2, q(3), day(6));
        assert_eq!(s3.phase, Phase::Relearning);
        assert_eq!(s3.due_at, day(9));
    }

    #[test]
    fn perfect_run_grows_strictly_after_third_review() {
        let mut state = ScheduleState::new(2.5, day(0));
        let mut now = day(0);
        let mut intervals = Vec::new();
        for _ in 0..10 {
            state = advance(&state, q(5), now);
            intervals.push(state.interval_days);
            now = state.due_at;
        }
        assert_eq!(&intervals[..2], &[1, 6]);
        for pair in intervals[1..].windows(2) {
            assert!(pair[1] > pair[0], "intervals not increasing: {intervals:?}");
        }
    }

    #[test]
    fn long_perfect_streak_is_capped() {
        let mut state = ScheduleState::new(2.5, day(0));
        for _ in 0..100 {
            state = advance(&state, q(5), day(0));
        }
        assert_eq!(state.interval_days, 36500);
        assert_eq!(state.due_at, day(36500));
        assert_eq!(state.repetition_count, 100);
    }

    #[test]
    fn uncapped_policy_saturates_instead_of_overflowing() {
        let policy = SchedulingPolicy {
            max_interval_days: u32::MAX,
            ..Default::default()
        };
        let mut state = ScheduleState::new(2.5, day(0));
        for _ in 0..100 {
            state = policy.advance(&state, q(5), day(0));
        }
        assert_eq!(state.interval_days, u32::MAX);
        assert_eq!(state.due_at, DateTime::<Utc>::MAX_UTC);

        // A lapse from there still lands one day out.
        let lapsed = policy.advance(&state, q(0), day(0));
        assert_eq!(lapsed.due_at, day(1));
    }

    #[test]
    fn max_interval_below_fixed_steps_rejected() {
        let policy = SchedulingPolicy {
            max_interval_days: 3,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    proptest! {
        #[test]
        fn ease_never_below_floor(qualities in proptest::collection::vec(0i64..=5, 1..60)) {
            let mut state = ScheduleState::new(2.5, day(0));
            let mut now = day(0);
            for raw in qualities {
                state = advance(&state, q(raw), now);
                prop_assert!(state.ease_factor >= 1.3);
                now = now + Duration::hours(13);
            }
        }

        #[test]
        fn lapse_always_resets(
            ease in 1.3f64..4.0,
            interval in 0u32..400,
            reps in 0u32..30,
            raw in 0i64..3,
        ) {
            let state = ScheduleState {
                ease_factor: ease,
                interval_days: interval,
                repetition_count: reps,
                due_at: day(interval as i64),
                phase: Phase::Review,
                lapse_count: 0,
                last_reviewed_at: None,
            };
            let next = advance(&state, q(raw), day(3));
            prop_assert_eq!(next.repetition_count, 0);
            prop_assert_eq!(next.interval_days, 1);
            prop_assert_eq!(next.phase, Phase::Relearning);
            prop_assert!(next.ease_factor <= ease);
        }

        #[test]
        fn due_never_moves_back_on_pass(
            qualities in proptest::collection::vec(3i64..=5, 1..40),
            gaps in proptest::collection::vec(0i64..20, 40),
        ) {
            let mut state = ScheduleState::new(2.5, day(0));
            let mut now = day(0);
            for (raw, gap) in qualities.into_iter().zip(gaps) {
                let next = advance(&state, q(raw), now);
                prop_assert!(next.due_at >= state.due_at);
                state = next;
                now = now + Duration::days(gap);
            }
        }
    }
}
