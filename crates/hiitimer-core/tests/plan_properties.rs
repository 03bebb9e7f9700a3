//! Property tests for the step plan builder and the session engine cursor.

use hiitimer_core::timer::{SessionEngine, StepTimerState, TickOutcome};
use hiitimer_core::{
    Exercise, ExerciseEntry, ExerciseSide, ResolvedPlan, Session, SessionSettings, StepType, User,
};
use proptest::prelude::*;

fn entries(count: usize) -> Vec<ExerciseEntry> {
    (0..count)
        .map(|i| {
            ExerciseEntry::new(
                Exercise::new(format!("ex{i}"), format!("Exercise {i}")),
                ExerciseSide::None,
            )
        })
        .collect()
}

fn settings_strategy() -> impl Strategy<Value = SessionSettings> {
    (
        1u64..120_000,
        0u64..60_000,
        0usize..12,
        prop_oneof![Just(0u64), 1u64..10_000],
        0u64..5_000,
        any::<bool>(),
    )
        .prop_map(|(work, rest, periods, prepare, count_down, beep)| SessionSettings {
            work_period_length_ms: work,
            rest_period_length_ms: rest,
            number_of_work_periods: periods,
            session_start_count_down_length_ms: prepare,
            period_start_count_down_length_ms: count_down,
            beep_sound_count_down_active: beep,
        })
}

fn credited_after_abort(settings: &SessionSettings, remaining_ms: u64) -> u64 {
    let mut engine = SessionEngine::new();
    let plan = ResolvedPlan {
        entries: entries(settings.number_of_work_periods),
        users: vec![User::new(1, "Alice")],
    };
    engine.load(Ok((settings.clone(), plan)));
    let total = engine.session().map_or(0, |s| s.duration_ms);
    match engine.on_tick(&StepTimerState::new(remaining_ms, total)) {
        Ok(TickOutcome::Finished { completion, .. }) => completion.summary.duration_ms,
        Ok(_) => engine
            .abort()
            .ok()
            .flatten()
            .map_or(0, |completion| completion.summary.duration_ms),
        Err(code) => panic!("tick failed: {code}"),
    }
}

proptest! {
    #[test]
    fn anchors_are_suffix_sums(settings in settings_strategy()) {
        let session = Session::build(&settings, &entries(settings.number_of_work_periods), &[]);

        let total: u64 = session.steps.iter().map(|s| s.duration_ms()).sum();
        prop_assert_eq!(session.duration_ms, total);

        if let Some(last) = session.steps.last() {
            prop_assert_eq!(last.remaining_session_duration_ms_after_me(), 0);
        }
        for pair in session.steps.windows(2) {
            prop_assert!(
                pair[0].remaining_session_duration_ms_after_me()
                    >= pair[1].remaining_session_duration_ms_after_me()
            );
            prop_assert_eq!(
                pair[0].remaining_session_duration_ms_after_me(),
                pair[1].session_remaining_at_start_ms()
            );
        }
    }

    #[test]
    fn steps_alternate_rest_then_work(settings in settings_strategy()) {
        let session = Session::build(&settings, &entries(settings.number_of_work_periods), &[]);

        let body: Vec<StepType> = session
            .steps
            .iter()
            .map(|s| s.step_type())
            .skip_while(|t| *t == StepType::Prepare)
            .collect();
        prop_assert_eq!(body.len(), settings.number_of_work_periods * 2);
        for pair in body.chunks(2) {
            prop_assert_eq!(pair, &[StepType::Rest, StepType::Work][..]);
        }
        prop_assert_eq!(
            session.steps.first().map(|s| s.step_type()) == Some(StepType::Prepare),
            settings.session_start_count_down_length_ms > 0
        );
    }

    #[test]
    fn cursor_stays_on_the_plan(
        settings in settings_strategy(),
        ticks in prop::collection::vec((0.0f64..1.0, any::<bool>()), 1..20),
    ) {
        let mut engine = SessionEngine::new();
        let plan = ResolvedPlan {
            entries: entries(settings.number_of_work_periods),
            users: Vec::new(),
        };
        engine.load(Ok((settings, plan)));
        let total = engine.session().map_or(0, |s| s.duration_ms);
        let len = engine.session().map_or(0, |s| s.steps.len());

        let mut ticks: Vec<(u64, bool)> = ticks
            .iter()
            .map(|(f, pause)| ((((total as f64) * f) as u64 + 1).min(total), *pause))
            .collect();
        ticks.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut last_cursor = 0;
        let mut countdown_total = total;
        for (r, pause) in ticks {
            let r = r.min(countdown_total);
            if r == 0 {
                break;
            }
            let tick = StepTimerState::new(r, countdown_total);
            if let Ok(TickOutcome::Running { .. }) = engine.on_tick(&tick) {
                prop_assert!(engine.cursor() < len);
                prop_assert!(engine.cursor() >= last_cursor);
                last_cursor = engine.cursor();
            } else {
                break;
            }
            if !pause {
                continue;
            }

            let before = engine.cursor();
            let on_work = engine.current_step().map(|s| s.step_type()) == Some(StepType::Work);
            prop_assert_eq!(engine.pause(), Ok(true));
            let expected = if on_work { before - 1 } else { before };
            prop_assert_eq!(engine.cursor(), expected);
            prop_assert_ne!(
                engine.current_step().map(|s| s.step_type()),
                Some(StepType::Work)
            );

            let restart = engine
                .current_step()
                .map(|s| s.session_remaining_at_start_ms());
            let resumed = engine.resume();
            prop_assert_eq!(resumed, Ok(restart));
            countdown_total = restart.unwrap_or(0);
            prop_assert!(countdown_total <= total);
            last_cursor = engine.cursor();
        }
    }

    #[test]
    fn abort_on_rest_credits_less_than_the_following_work(settings in settings_strategy()) {
        prop_assume!(settings.number_of_work_periods > 0);
        prop_assume!(settings.rest_period_length_ms > 0);
        let session = Session::build(&settings, &entries(settings.number_of_work_periods), &[]);

        for (i, step) in session.steps.iter().enumerate() {
            if step.step_type() != StepType::Rest {
                continue;
            }
            let work = &session.steps[i + 1];
            prop_assert_eq!(work.step_type(), StepType::Work);

            // Just inside the Rest step, then the first instant of the Work step.
            let inside_rest = step.remaining_session_duration_ms_after_me() + 1;
            let on_rest = credited_after_abort(&settings, inside_rest);
            let on_work = credited_after_abort(&settings, work.session_remaining_at_start_ms());
            prop_assert!(
                on_rest < on_work,
                "rest step {} credited {} but the work after it credited {}",
                i,
                on_rest,
                on_work
            );
        }
    }

    #[test]
    fn aborting_later_never_credits_less(
        settings in settings_strategy(),
        a in 0.0f64..1.0,
        b in 0.0f64..1.0,
    ) {
        let total = Session::build(&settings, &entries(settings.number_of_work_periods), &[])
            .duration_ms;
        prop_assume!(total > 0);
        let earlier = ((total as f64) * a.max(b)) as u64 + 1;
        let later = ((total as f64) * a.min(b)) as u64 + 1;

        let early_credit = credited_after_abort(&settings, earlier.min(total));
        let late_credit = credited_after_abort(&settings, later.min(total));
        prop_assert!(early_credit <= late_credit);

        let max_credit = settings.number_of_work_periods as u64
            * (settings.work_period_length_ms + settings.rest_period_length_ms);
        prop_assert!(late_credit <= max_credit);
    }
}
