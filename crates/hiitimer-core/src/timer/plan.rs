//! Step plan builder.
//!
//! Turns the session settings and a resolved exercise sequence into the
//! ordered list of steps the engine walks through. Every step carries the
//! sum of the durations of all steps after it, so the engine can locate the
//! current step from a single whole-session countdown value.

use serde::{Deserialize, Serialize};

use crate::exercise::{Exercise, ExerciseEntry, ExerciseSide, User};
use crate::format::format_duration_ms;

/// Upper bound on `number_of_work_periods` accepted from configuration.
pub const MAX_WORK_PERIODS: usize = 1000;

/// Timing settings for one session attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub work_period_length_ms: u64,
    pub rest_period_length_ms: u64,
    pub number_of_work_periods: usize,
    /// Length of the Prepare step; 0 disables it.
    pub session_start_count_down_length_ms: u64,
    /// Tail of each Rest/Work step that counts down audibly.
    pub period_start_count_down_length_ms: u64,
    pub beep_sound_count_down_active: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            work_period_length_ms: 20_000,
            rest_period_length_ms: 10_000,
            number_of_work_periods: 8,
            session_start_count_down_length_ms: 5_000,
            period_start_count_down_length_ms: 3_000,
            beep_sound_count_down_active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Prepare,
    Rest,
    Work,
}

/// Timing shared by every step variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
    pub duration_ms: u64,
    /// Sum of the durations of every step strictly after this one.
    pub remaining_session_duration_ms_after_me: u64,
    /// How many of this step's final milliseconds count down audibly.
    pub count_down_length_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    Prepare {
        timing: StepTiming,
    },
    Rest {
        exercise: Exercise,
        side: ExerciseSide,
        timing: StepTiming,
        duration_formatted: String,
    },
    Work {
        exercise: Exercise,
        side: ExerciseSide,
        timing: StepTiming,
        duration_formatted: String,
    },
}

impl Step {
    pub fn step_type(&self) -> StepType {
        match self {
            Step::Prepare { .. } => StepType::Prepare,
            Step::Rest { .. } => StepType::Rest,
            Step::Work { .. } => StepType::Work,
        }
    }

    pub fn timing(&self) -> &StepTiming {
        match self {
            Step::Prepare { timing } | Step::Rest { timing, .. } | Step::Work { timing, .. } => {
                timing
            }
        }
    }

    fn timing_mut(&mut self) -> &mut StepTiming {
        match self {
            Step::Prepare { timing } | Step::Rest { timing, .. } | Step::Work { timing, .. } => {
                timing
            }
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.timing().duration_ms
    }

    pub fn remaining_session_duration_ms_after_me(&self) -> u64 {
        self.timing().remaining_session_duration_ms_after_me
    }

    pub fn count_down_length_ms(&self) -> u64 {
        self.timing().count_down_length_ms
    }

    /// Countdown value at which this step starts.
    pub fn session_remaining_at_start_ms(&self) -> u64 {
        self.duration_ms()
            .saturating_add(self.remaining_session_duration_ms_after_me())
    }

    /// The exercise previewed (Rest) or performed (Work).
    pub fn exercise(&self) -> Option<(&Exercise, ExerciseSide)> {
        match self {
            Step::Prepare { .. } => None,
            Step::Rest { exercise, side, .. } | Step::Work { exercise, side, .. } => {
                Some((exercise, *side))
            }
        }
    }
}

/// A built, immutable session plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub steps: Vec<Step>,
    pub duration_ms: u64,
    pub beep_sound_count_down_active: bool,
    pub users: Vec<User>,
    pub rest_step_duration_ms: u64,
    pub work_step_duration_ms: u64,
}

impl Session {
    /// Build the step plan.
    ///
    /// Each entry yields a Rest step previewing the exercise followed by the
    /// Work step performing it. A Prepare step leads when the session-start
    /// countdown is enabled. Anchors are filled by one reverse pass.
    pub fn build(settings: &SessionSettings, entries: &[ExerciseEntry], users: &[User]) -> Self {
        let mut steps = Vec::with_capacity(entries.len().saturating_mul(2).saturating_add(1));

        if settings.session_start_count_down_length_ms > 0 {
            steps.push(Step::Prepare {
                timing: StepTiming {
                    duration_ms: settings.session_start_count_down_length_ms,
                    remaining_session_duration_ms_after_me: 0,
                    count_down_length_ms: settings.session_start_count_down_length_ms,
                },
            });
        }

        let period_timing = |duration_ms: u64| StepTiming {
            duration_ms,
            remaining_session_duration_ms_after_me: 0,
            count_down_length_ms: settings.period_start_count_down_length_ms,
        };
        for entry in entries {
            steps.push(Step::Rest {
                exercise: entry.exercise.clone(),
                side: entry.side,
                timing: period_timing(settings.rest_period_length_ms),
                duration_formatted: format_duration_ms(settings.rest_period_length_ms),
            });
            steps.push(Step::Work {
                exercise: entry.exercise.clone(),
                side: entry.side,
                timing: period_timing(settings.work_period_length_ms),
                duration_formatted: format_duration_ms(settings.work_period_length_ms),
            });
        }

        let mut suffix = 0u64;
        for step in steps.iter_mut().rev() {
            let timing = step.timing_mut();
            timing.remaining_session_duration_ms_after_me = suffix;
            suffix = suffix.saturating_add(timing.duration_ms);
        }

        let duration_ms = steps
            .first()
            .map(Step::session_remaining_at_start_ms)
            .unwrap_or(0);

        Self {
            steps,
            duration_ms,
            beep_sound_count_down_active: settings.beep_sound_count_down_active,
            users: users.to_vec(),
            rest_step_duration_ms: settings.rest_period_length_ms,
            work_step_duration_ms: settings.work_period_length_ms,
        }
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn user_ids(&self) -> Vec<i64> {
        self.users.iter().map(|u| u.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(prepare_ms: u64) -> SessionSettings {
        SessionSettings {
            work_period_length_ms: 20_000,
            rest_period_length_ms: 10_000,
            number_of_work_periods: 1,
            session_start_count_down_length_ms: prepare_ms,
            period_start_count_down_length_ms: 3_000,
            beep_sound_count_down_active: true,
        }
    }

    fn one_exercise() -> Vec<ExerciseEntry> {
        vec![ExerciseEntry::new(
            Exercise::new("squats", "Squats"),
            ExerciseSide::None,
        )]
    }

    #[test]
    fn rest_then_work_without_prepare() {
        let session = Session::build(&settings(0), &one_exercise(), &[]);
        let types: Vec<_> = session.steps.iter().map(Step::step_type).collect();
        assert_eq!(types, vec![StepType::Rest, StepType::Work]);
        assert_eq!(session.steps[0].duration_ms(), 10_000);
        assert_eq!(session.steps[1].duration_ms(), 20_000);
        assert_eq!(session.duration_ms, 30_000);
    }

    #[test]
    fn prepare_leads_when_enabled() {
        let session = Session::build(&settings(5_000), &one_exercise(), &[]);
        let types: Vec<_> = session.steps.iter().map(Step::step_type).collect();
        assert_eq!(types, vec![StepType::Prepare, StepType::Rest, StepType::Work]);
        assert_eq!(session.duration_ms, 35_000);
    }

    #[test]
    fn anchors_are_suffix_sums() {
        let session = Session::build(&settings(5_000), &one_exercise(), &[]);
        let anchors: Vec<_> = session
            .steps
            .iter()
            .map(Step::remaining_session_duration_ms_after_me)
            .collect();
        assert_eq!(anchors, vec![30_000, 20_000, 0]);
    }

    #[test]
    fn prepare_counts_down_for_its_whole_length() {
        let session = Session::build(&settings(5_000), &one_exercise(), &[]);
        assert_eq!(session.steps[0].count_down_length_ms(), 5_000);
        assert_eq!(session.steps[1].count_down_length_ms(), 3_000);
        assert_eq!(session.steps[2].count_down_length_ms(), 3_000);
    }

    #[test]
    fn empty_sequence_without_prepare_is_empty() {
        let session = Session::build(&settings(0), &[], &[]);
        assert!(session.is_empty());
        assert_eq!(session.duration_ms, 0);
    }

    #[test]
    fn empty_sequence_with_prepare_is_prepare_only() {
        let session = Session::build(&settings(5_000), &[], &[]);
        assert_eq!(session.steps.len(), 1);
        assert_eq!(session.duration_ms, 5_000);
    }

    #[test]
    fn rest_and_work_carry_formatted_duration() {
        let session = Session::build(&settings(0), &one_exercise(), &[]);
        match &session.steps[1] {
            Step::Work {
                duration_formatted, ..
            } => assert_eq!(duration_formatted, "20s"),
            other => panic!("expected work step, got {other:?}"),
        }
    }
}
