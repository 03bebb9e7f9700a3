//! Step-progression state machine.
//!
//! The engine is synchronous and owns exactly one piece of mutable
//! progression state: the cursor into the session's steps. It is driven by
//! ticks of the whole-session countdown and by user commands; it never
//! touches the timer itself. The caller (see [`super::controller`]) starts
//! and cancels the countdown according to what each command returns.
//!
//! ## State Transitions
//!
//! ```text
//! Loading -> (InitialCountDown | RunningNominal) <-> Paused -> Finished
//!    \-> Error                                    \-> Finished
//! any -> Loading (reset)
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::countdown::StepTimerState;
use super::plan::{Session, SessionSettings, Step, StepType};
use super::view::{self, CountDown, DisplaySnapshot, RunningSnapshot};
use crate::error::ErrorCode;
use crate::exercise::ExerciseEntry;
use crate::format::format_duration_ms;
use crate::ports::{NewSessionRecord, ResolvedPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Loading,
    InitialCountDown,
    RunningNominal,
    Paused,
    Finished,
    Error,
}

impl SessionPhase {
    pub fn is_running(self) -> bool {
        matches!(self, SessionPhase::InitialCountDown | SessionPhase::RunningNominal)
    }
}

/// What the presentation layer shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionViewState {
    Loading,
    InitialCountDown { count_down: CountDown },
    RunningNominal(RunningSnapshot),
    Finished(SessionSummary),
    Error { code: ErrorCode },
}

impl From<DisplaySnapshot> for SessionViewState {
    fn from(snapshot: DisplaySnapshot) -> Self {
        match snapshot {
            DisplaySnapshot::InitialCountDown { count_down } => {
                SessionViewState::InitialCountDown { count_down }
            }
            DisplaySnapshot::RunningNominal(running) => SessionViewState::RunningNominal(running),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    #[default]
    None,
    Pause,
}

/// End-of-session summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub duration_ms: u64,
    pub duration_formatted: String,
    /// Work steps credited to the session, in order.
    pub work_steps: Vec<ExerciseEntry>,
}

/// A record to persist, waiting for its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub duration_ms: u64,
    pub user_ids: Vec<i64>,
}

impl PendingRecord {
    pub fn stamp(self, timestamp: chrono::DateTime<chrono::Utc>) -> NewSessionRecord {
        NewSessionRecord {
            timestamp,
            duration_ms: self.duration_ms,
            user_ids: self.user_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub summary: SessionSummary,
    /// `None` when nothing was credited.
    pub record: Option<PendingRecord>,
}

/// Audio cues requested by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Beeps {
    /// A step ended (or the session did).
    pub boundary: bool,
    /// The current step is inside its countdown tail.
    pub count_down: bool,
}

impl Beeps {
    pub fn any(&self) -> bool {
        self.boundary || self.count_down
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Start the countdown with this total.
    Start { total_ms: u64 },
    /// The plan was empty.
    Finished(Completion),
    Failed(ErrorCode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not running; stale tick from a cancelled countdown.
    Ignored,
    Running {
        view: SessionViewState,
        beeps: Beeps,
        /// Cursor after this tick when it moved.
        advanced_to: Option<usize>,
    },
    Finished { completion: Completion, beeps: Beeps },
}

/// Session state machine.
#[derive(Debug, Clone)]
pub struct SessionEngine {
    phase: SessionPhase,
    session: Option<Session>,
    cursor: usize,
}

impl SessionEngine {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Loading,
            session: None,
            cursor: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.session.as_ref()?.step(self.cursor)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Build the session from what the collaborators resolved.
    ///
    /// Ignored outside `Loading`.
    pub fn load(
        &mut self,
        resolved: Result<(SessionSettings, ResolvedPlan), ErrorCode>,
    ) -> Option<LoadOutcome> {
        if self.phase != SessionPhase::Loading {
            debug!(phase = ?self.phase, "load ignored");
            return None;
        }
        let (settings, plan) = match resolved {
            Ok(resolved) => resolved,
            Err(code) => return Some(LoadOutcome::Failed(self.fail(code))),
        };

        let session = Session::build(&settings, &plan.entries, &plan.users);
        info!(
            steps = session.steps.len(),
            duration_ms = session.duration_ms,
            users = session.users.len(),
            "session built"
        );
        let first = session.steps.first().map(Step::step_type);
        let total_ms = session.duration_ms;
        self.session = Some(session);
        self.cursor = 0;

        match first {
            None => Some(LoadOutcome::Finished(self.finish()?)),
            Some(step_type) => {
                self.phase = running_phase(step_type);
                Some(LoadOutcome::Start { total_ms })
            }
        }
    }

    /// Handle one countdown tick.
    ///
    /// # Errors
    /// [`ErrorCode::SessionNotFound`] if a tick arrives before any session
    /// was built or the cursor fell off the plan; the engine is then in
    /// `Error`.
    pub fn on_tick(&mut self, tick: &StepTimerState) -> Result<TickOutcome, ErrorCode> {
        match self.phase {
            SessionPhase::Loading => return Err(self.fail(ErrorCode::SessionNotFound)),
            SessionPhase::Paused | SessionPhase::Finished | SessionPhase::Error => {
                return Ok(TickOutcome::Ignored)
            }
            SessionPhase::InitialCountDown | SessionPhase::RunningNominal => {}
        }
        let Some(session) = self.session.as_ref() else {
            return Err(self.fail(ErrorCode::SessionNotFound));
        };
        let beep_active = session.beep_sound_count_down_active;

        if tick.is_terminal() {
            let completion = self.finish().ok_or(ErrorCode::SessionNotFound)?;
            return Ok(TickOutcome::Finished {
                completion,
                beeps: Beeps {
                    boundary: beep_active,
                    count_down: false,
                },
            });
        }

        let mut cursor = self.cursor;
        let mut advanced = false;
        while cursor + 1 < session.steps.len()
            && tick.milli_seconds_remaining
                <= session.steps[cursor].remaining_session_duration_ms_after_me()
        {
            cursor += 1;
            advanced = true;
        }

        let Some(snapshot) = view::map(session, cursor, tick) else {
            return Err(self.fail(ErrorCode::SessionNotFound));
        };
        let count_down_beep = snapshot.count_down().is_some_and(|cd| cd.play_beep);
        let step_type = session.steps[cursor].step_type();

        if advanced {
            debug!(from = self.cursor, to = cursor, ?step_type, "step advanced");
        }
        self.cursor = cursor;
        self.phase = running_phase(step_type);

        Ok(TickOutcome::Running {
            view: snapshot.into(),
            beeps: Beeps {
                boundary: advanced && beep_active,
                count_down: count_down_beep,
            },
            advanced_to: advanced.then_some(cursor),
        })
    }

    /// Pause the session.
    ///
    /// A pause on a Work step rewinds the cursor onto the Rest step before
    /// it, so resuming always goes through the exercise preview again.
    /// Returns true if the engine is now paused and the countdown must be
    /// cancelled.
    ///
    /// # Errors
    /// [`ErrorCode::SessionNotFound`] if nothing was loaded.
    pub fn pause(&mut self) -> Result<bool, ErrorCode> {
        match self.phase {
            SessionPhase::InitialCountDown | SessionPhase::RunningNominal => {}
            SessionPhase::Loading => return Err(self.fail(ErrorCode::SessionNotFound)),
            phase => {
                debug!(?phase, "pause ignored");
                return Ok(false);
            }
        }
        let Some(step) = self.current_step() else {
            return Err(self.fail(ErrorCode::SessionNotFound));
        };
        if step.step_type() == StepType::Work {
            // The first step is never Work, so there is always a Rest before it.
            self.cursor = self.cursor.saturating_sub(1);
        }
        self.phase = SessionPhase::Paused;
        info!(cursor = self.cursor, "session paused");
        Ok(true)
    }

    /// Resume a paused session.
    ///
    /// Returns the countdown total to restart with: the current step's full
    /// length plus everything after it.
    ///
    /// # Errors
    /// [`ErrorCode::SessionNotFound`] if nothing was loaded.
    pub fn resume(&mut self) -> Result<Option<u64>, ErrorCode> {
        match self.phase {
            SessionPhase::Paused => {}
            SessionPhase::Loading => return Err(self.fail(ErrorCode::SessionNotFound)),
            phase => {
                debug!(?phase, "resume ignored");
                return Ok(None);
            }
        }
        let Some(step) = self.current_step() else {
            return Err(self.fail(ErrorCode::SessionNotFound));
        };
        let total_ms = step.session_remaining_at_start_ms();
        self.phase = running_phase(step.step_type());
        info!(cursor = self.cursor, total_ms, "session resumed");
        Ok(Some(total_ms))
    }

    /// Abort a running or paused session.
    ///
    /// # Errors
    /// [`ErrorCode::SessionNotFound`] if nothing was loaded.
    pub fn abort(&mut self) -> Result<Option<Completion>, ErrorCode> {
        match self.phase {
            SessionPhase::InitialCountDown
            | SessionPhase::RunningNominal
            | SessionPhase::Paused => {}
            SessionPhase::Loading => return Err(self.fail(ErrorCode::SessionNotFound)),
            phase => {
                debug!(?phase, "abort ignored");
                return Ok(None);
            }
        }
        info!(cursor = self.cursor, "session aborted");
        self.finish().map(Some).ok_or(ErrorCode::SessionNotFound)
    }

    /// Drop everything and go back to `Loading`.
    pub fn reset(&mut self) {
        self.phase = SessionPhase::Loading;
        self.session = None;
        self.cursor = 0;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn fail(&mut self, code: ErrorCode) -> ErrorCode {
        warn!(%code, phase = ?self.phase, "session failed");
        self.phase = SessionPhase::Error;
        self.session = None;
        code
    }

    /// End-of-session accounting.
    ///
    /// A trailing Rest step is not credited. Steps up to the cursor are
    /// split into Rest and Work; the session is credited only when both
    /// kinds are present. Consumes the session so it can only run once.
    fn finish(&mut self) -> Option<Completion> {
        let session = self.session.take()?;

        let last_taken = match session.steps.get(self.cursor) {
            Some(Step::Rest { .. }) => self.cursor.checked_sub(1),
            _ => Some(self.cursor),
        };
        let taken = last_taken
            .and_then(|last| session.steps.get(..=last))
            .unwrap_or(&[]);
        self.cursor = last_taken.unwrap_or(0);

        let mut rest_count = 0u64;
        let mut work_steps = Vec::new();
        for step in taken {
            match step {
                Step::Prepare { .. } => {}
                Step::Rest { .. } => rest_count += 1,
                Step::Work { exercise, side, .. } => {
                    work_steps.push(ExerciseEntry::new(exercise.clone(), *side));
                }
            }
        }
        let work_count = work_steps.len() as u64;

        let duration_ms = if rest_count > 0 && work_count > 0 {
            rest_count
                .saturating_mul(session.rest_step_duration_ms)
                .saturating_add(work_count.saturating_mul(session.work_step_duration_ms))
        } else {
            0
        };

        self.phase = SessionPhase::Finished;
        info!(duration_ms, rest_count, work_count, "session finished");

        let record = (duration_ms > 0).then(|| PendingRecord {
            duration_ms,
            user_ids: session.user_ids(),
        });
        Some(Completion {
            summary: SessionSummary {
                duration_ms,
                duration_formatted: format_duration_ms(duration_ms),
                work_steps,
            },
            record,
        })
    }
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn running_phase(step_type: StepType) -> SessionPhase {
    match step_type {
        StepType::Prepare => SessionPhase::InitialCountDown,
        StepType::Rest | StepType::Work => SessionPhase::RunningNominal,
    }
}
