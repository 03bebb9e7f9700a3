//! Display snapshots derived from (session, cursor, tick).
//!
//! Everything here is a pure function of its inputs. The engine owns the
//! cursor and hands it in.

use serde::{Deserialize, Serialize};

use super::countdown::StepTimerState;
use super::plan::{Session, Step, StepType};
use crate::exercise::{Exercise, ExerciseSide};
use crate::format::{format_clock_ms, whole_seconds};

/// The audible "3-2-1" tail of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountDown {
    pub seconds_display: String,
    /// 1.0 when the countdown begins, 0.0 when it reaches zero.
    pub progress: f32,
    pub play_beep: bool,
}

impl CountDown {
    fn new(step_remaining_ms: u64, count_down_length_ms: u64, play_beep: bool) -> Self {
        Self {
            seconds_display: whole_seconds(step_remaining_ms),
            progress: ratio(step_remaining_ms, count_down_length_ms),
            play_beep,
        }
    }
}

/// Display state while on a Rest or Work step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningSnapshot {
    pub step_index: usize,
    pub step_type: StepType,
    pub exercise: Exercise,
    pub side: ExerciseSide,
    pub step_duration_formatted: String,
    pub step_remaining_ms: u64,
    pub step_remaining_formatted: String,
    pub step_remaining_percentage: f32,
    pub session_remaining_ms: u64,
    pub session_remaining_formatted: String,
    pub session_remaining_percentage: f32,
    pub count_down: Option<CountDown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplaySnapshot {
    /// Prepare step: only the countdown is shown.
    InitialCountDown { count_down: CountDown },
    RunningNominal(RunningSnapshot),
}

impl DisplaySnapshot {
    pub fn count_down(&self) -> Option<&CountDown> {
        match self {
            DisplaySnapshot::InitialCountDown { count_down } => Some(count_down),
            DisplaySnapshot::RunningNominal(running) => running.count_down.as_ref(),
        }
    }
}

/// Milliseconds left in `step` for the given tick.
pub fn step_remaining_ms(step: &Step, tick: &StepTimerState) -> u64 {
    tick.milli_seconds_remaining
        .saturating_sub(step.remaining_session_duration_ms_after_me())
        .min(step.duration_ms())
}

/// Map a tick onto the display snapshot for the step at `index`.
///
/// Returns `None` if `index` is past the end of the plan.
pub fn map(session: &Session, index: usize, tick: &StepTimerState) -> Option<DisplaySnapshot> {
    let step = session.step(index)?;
    let step_remaining = step_remaining_ms(step, tick);
    let count_down_length = step.count_down_length_ms();
    let beep = session.beep_sound_count_down_active;

    let snapshot = match step {
        Step::Prepare { .. } => DisplaySnapshot::InitialCountDown {
            count_down: CountDown::new(step_remaining, count_down_length, beep),
        },
        Step::Rest {
            exercise,
            side,
            duration_formatted,
            ..
        }
        | Step::Work {
            exercise,
            side,
            duration_formatted,
            ..
        } => {
            let count_down = (step_remaining <= count_down_length)
                .then(|| CountDown::new(step_remaining, count_down_length, beep));
            DisplaySnapshot::RunningNominal(RunningSnapshot {
                step_index: index,
                step_type: step.step_type(),
                exercise: exercise.clone(),
                side: *side,
                step_duration_formatted: duration_formatted.clone(),
                step_remaining_ms: step_remaining,
                step_remaining_formatted: format_clock_ms(step_remaining),
                step_remaining_percentage: ratio(step_remaining, step.duration_ms()),
                session_remaining_ms: tick.milli_seconds_remaining,
                session_remaining_formatted: format_clock_ms(tick.milli_seconds_remaining),
                session_remaining_percentage: tick.remaining_percentage,
                count_down,
            })
        }
    };
    Some(snapshot)
}

fn ratio(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::ExerciseEntry;
    use crate::timer::plan::SessionSettings;

    fn session(prepare_ms: u64, beep: bool) -> Session {
        let settings = SessionSettings {
            work_period_length_ms: 20_000,
            rest_period_length_ms: 10_000,
            number_of_work_periods: 1,
            session_start_count_down_length_ms: prepare_ms,
            period_start_count_down_length_ms: 3_000,
            beep_sound_count_down_active: beep,
        };
        let entries = [ExerciseEntry::new(
            Exercise::new("squats", "Squats"),
            ExerciseSide::None,
        )];
        Session::build(&settings, &entries, &[])
    }

    fn tick(remaining: u64, total: u64) -> StepTimerState {
        StepTimerState::new(remaining, total)
    }

    #[test]
    fn running_snapshot_splits_step_and_session() {
        let s = session(0, true);
        let snap = map(&s, 1, &tick(15_000, 30_000)).unwrap();
        let DisplaySnapshot::RunningNominal(running) = snap else {
            panic!("expected running snapshot");
        };
        assert_eq!(running.step_type, StepType::Work);
        assert_eq!(running.step_remaining_ms, 15_000);
        assert_eq!(running.step_remaining_formatted, "00:15");
        assert!((running.step_remaining_percentage - 0.75).abs() < 1e-6);
        assert!((running.session_remaining_percentage - 0.5).abs() < 1e-6);
        assert_eq!(running.session_remaining_formatted, "00:15");
        assert!(running.count_down.is_none());
    }

    #[test]
    fn count_down_appears_at_threshold() {
        let s = session(0, true);
        let before = map(&s, 1, &tick(3_001, 30_000)).unwrap();
        assert!(before.count_down().is_none());

        let at = map(&s, 1, &tick(3_000, 30_000)).unwrap();
        let cd = at.count_down().unwrap();
        assert_eq!(cd.seconds_display, "3");
        assert!((cd.progress - 1.0).abs() < 1e-6);
        assert!(cd.play_beep);
    }

    #[test]
    fn count_down_respects_beep_setting() {
        let s = session(0, false);
        let snap = map(&s, 1, &tick(1_000, 30_000)).unwrap();
        let cd = snap.count_down().unwrap();
        assert!(!cd.play_beep);
        assert_eq!(cd.seconds_display, "1");
    }

    #[test]
    fn prepare_is_initial_count_down() {
        let s = session(5_000, true);
        let snap = map(&s, 0, &tick(35_000, 35_000)).unwrap();
        match snap {
            DisplaySnapshot::InitialCountDown { count_down } => {
                assert_eq!(count_down.seconds_display, "5");
                assert!((count_down.progress - 1.0).abs() < 1e-6);
            }
            other => panic!("expected initial count down, got {other:?}"),
        }
    }

    #[test]
    fn step_remaining_is_clamped_at_zero() {
        let s = session(0, true);
        // Tick already below the rest step's anchor.
        let snap = map(&s, 0, &tick(19_000, 30_000)).unwrap();
        let DisplaySnapshot::RunningNominal(running) = snap else {
            panic!("expected running snapshot");
        };
        assert_eq!(running.step_remaining_ms, 0);
        assert_eq!(running.step_remaining_percentage, 0.0);
    }

    #[test]
    fn out_of_range_index_is_none() {
        let s = session(0, true);
        assert!(map(&s, 2, &tick(0, 30_000)).is_none());
    }
}
