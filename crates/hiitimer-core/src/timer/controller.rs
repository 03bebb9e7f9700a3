//! Session actor.
//!
//! One tokio task owns the engine, the countdown and the collaborators. It
//! waits on user commands and countdown ticks in a single `select!` loop,
//! so a tick is fully handled before the next command or tick is looked at
//! and no locking is needed. The presentation layer talks to it through a
//! cloneable [`SessionHandle`].

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::countdown::{CountdownTimer, StepTimerState, DEFAULT_TICK_MS};
use super::engine::{
    Completion, DialogState, LoadOutcome, SessionEngine, SessionViewState, TickOutcome,
};
use crate::error::ErrorCode;
use crate::events::Event;
use crate::ports::{BeepSignal, Clock, ExerciseSource, SessionRecorder, SettingsSource};

const EVENT_BUFFER: usize = 64;

/// Everything the session actor consumes.
pub struct SessionServices {
    pub settings: Box<dyn SettingsSource>,
    pub exercises: Box<dyn ExerciseSource>,
    pub recorder: Box<dyn SessionRecorder>,
    pub clock: Box<dyn Clock>,
    pub beep: BeepSignal,
    pub tick_period: Duration,
}

impl SessionServices {
    pub fn new(
        settings: Box<dyn SettingsSource>,
        exercises: Box<dyn ExerciseSource>,
        recorder: Box<dyn SessionRecorder>,
        clock: Box<dyn Clock>,
        beep: BeepSignal,
    ) -> Self {
        Self {
            settings,
            exercises,
            recorder,
            clock,
            beep,
            tick_period: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }

    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    ReadyToStart,
    Pause,
    Resume,
    Abort,
    ResetAndStart,
}

/// Handle to a running session actor.
///
/// Dropping every handle stops the actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionViewState>,
    dialog: watch::Receiver<DialogState>,
    events: broadcast::Sender<Event>,
}

impl SessionHandle {
    /// Spawn the session actor. It stays in `Loading` until
    /// [`SessionHandle::on_ready_to_start`] is called.
    pub fn spawn(services: SessionServices) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionViewState::Loading);
        let (dialog_tx, dialog_rx) = watch::channel(DialogState::None);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        let actor = SessionActor {
            engine: SessionEngine::new(),
            timer: CountdownTimer::new(services.tick_period),
            attempt_id: Uuid::new_v4(),
            services,
            state: state_tx,
            dialog: dialog_tx,
            events: events_tx.clone(),
        };
        let task = tokio::spawn(actor.run(commands_rx));

        let handle = Self {
            commands: commands_tx,
            state: state_rx,
            dialog: dialog_rx,
            events: events_tx,
        };
        (handle, task)
    }

    pub fn state(&self) -> watch::Receiver<SessionViewState> {
        self.state.clone()
    }

    pub fn dialog(&self) -> watch::Receiver<DialogState> {
        self.dialog.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Load settings, build the session and start counting down.
    pub fn on_ready_to_start(&self) {
        self.send(Command::ReadyToStart);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    pub fn abort_session(&self) {
        self.send(Command::Abort);
    }

    /// Discard the current attempt and start a fresh one.
    pub fn reset_and_start(&self) {
        self.send(Command::ResetAndStart);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!(?command, "session actor has stopped");
        }
    }
}

struct SessionActor {
    engine: SessionEngine,
    timer: CountdownTimer,
    attempt_id: Uuid,
    services: SessionServices,
    state: watch::Sender<SessionViewState>,
    dialog: watch::Sender<DialogState>,
    events: broadcast::Sender<Event>,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(tick) = self.timer.next_tick() => self.handle_tick(&tick),
            }
        }
        self.timer.cancel();
        debug!("session actor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        debug!(?command, phase = ?self.engine.phase(), "command");
        match command {
            Command::ReadyToStart => self.load(),
            Command::Pause => match self.engine.pause() {
                Ok(true) => {
                    self.timer.cancel();
                    self.dialog.send_replace(DialogState::Pause);
                    self.emit(Event::SessionPaused {
                        attempt_id: self.attempt_id,
                        step_index: self.engine.cursor(),
                        at: self.services.clock.now(),
                    });
                }
                Ok(false) => {}
                Err(code) => self.fail(code),
            },
            Command::Resume => match self.engine.resume() {
                Ok(Some(total_ms)) => {
                    self.dialog.send_replace(DialogState::None);
                    self.timer.start(total_ms);
                    self.emit(Event::SessionResumed {
                        attempt_id: self.attempt_id,
                        step_index: self.engine.cursor(),
                        remaining_ms: total_ms,
                        at: self.services.clock.now(),
                    });
                }
                Ok(None) => {}
                Err(code) => self.fail(code),
            },
            Command::Abort => {
                self.timer.cancel();
                match self.engine.abort() {
                    Ok(Some(completion)) => self.complete(completion),
                    Ok(None) => {}
                    Err(code) => self.fail(code),
                }
                self.dialog.send_replace(DialogState::None);
            }
            Command::ResetAndStart => {
                self.timer.cancel();
                self.engine.reset();
                self.dialog.send_replace(DialogState::None);
                self.state.send_replace(SessionViewState::Loading);
                self.emit(Event::SessionReset {
                    at: self.services.clock.now(),
                });
                self.load();
            }
        }
    }

    fn handle_tick(&mut self, tick: &StepTimerState) {
        match self.engine.on_tick(tick) {
            Ok(TickOutcome::Ignored) => {
                debug!(remaining_ms = tick.milli_seconds_remaining, "stale tick ignored");
            }
            Ok(TickOutcome::Running {
                view,
                beeps,
                advanced_to,
            }) => {
                if let Some(step_index) = advanced_to {
                    if let Some(step) = self.engine.current_step() {
                        let step_type = step.step_type();
                        self.emit(Event::StepAdvanced {
                            attempt_id: self.attempt_id,
                            step_index,
                            step_type,
                            at: self.services.clock.now(),
                        });
                    }
                }
                if beeps.any() {
                    self.services.beep.play();
                }
                self.state.send_replace(view);
            }
            Ok(TickOutcome::Finished { completion, beeps }) => {
                if beeps.any() {
                    self.services.beep.play();
                }
                self.complete(completion);
            }
            Err(code) => self.fail(code),
        }
    }

    fn load(&mut self) {
        self.attempt_id = Uuid::new_v4();
        let resolved = self.resolve();
        match self.engine.load(resolved) {
            Some(LoadOutcome::Start { total_ms }) => {
                let step_count = self.engine.session().map_or(0, |s| s.steps.len());
                self.emit(Event::SessionStarted {
                    attempt_id: self.attempt_id,
                    step_count,
                    duration_ms: total_ms,
                    at: self.services.clock.now(),
                });
                self.timer.start(total_ms);
            }
            Some(LoadOutcome::Finished(completion)) => self.complete(completion),
            Some(LoadOutcome::Failed(code)) => self.publish_error(code),
            None => {}
        }
    }

    /// Settings are read once per attempt; later edits only apply to the
    /// next attempt.
    fn resolve(
        &mut self,
    ) -> Result<(crate::timer::SessionSettings, crate::ports::ResolvedPlan), ErrorCode> {
        let settings = self.services.settings.session_settings().map_err(|err| {
            warn!(error = %err, "failed to read session settings");
            ErrorCode::SettingsUnavailable
        })?;
        // Only a failed draw reports ExercisesUnavailable; a config file that
        // cannot be re-read is still a settings failure.
        let plan = self.services.exercises.resolve(&settings).map_err(|err| {
            warn!(error = %err, "failed to resolve exercises");
            err.code()
        })?;
        Ok((settings, plan))
    }

    fn complete(&mut self, completion: Completion) {
        self.timer.cancel();
        let Completion { summary, record } = completion;

        let recorded = match record {
            Some(pending) => {
                let record = pending.stamp(self.services.clock.now());
                match self.services.recorder.insert(&record) {
                    Ok(rows) => {
                        info!(rows, duration_ms = record.duration_ms, "session recorded");
                        true
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to record session");
                        false
                    }
                }
            }
            None => false,
        };

        self.emit(Event::SessionFinished {
            attempt_id: self.attempt_id,
            duration_ms: summary.duration_ms,
            work_steps: summary.work_steps.len(),
            recorded,
            at: self.services.clock.now(),
        });
        self.dialog.send_replace(DialogState::None);
        self.state.send_replace(SessionViewState::Finished(summary));
    }

    fn fail(&mut self, code: ErrorCode) {
        self.timer.cancel();
        self.publish_error(code);
    }

    fn publish_error(&mut self, code: ErrorCode) {
        self.emit(Event::SessionFailed {
            attempt_id: self.attempt_id,
            code,
            at: self.services.clock.now(),
        });
        self.dialog.send_replace(DialogState::None);
        self.state.send_replace(SessionViewState::Error { code });
    }

    fn emit(&self, event: Event) {
        debug!(?event, "session event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
