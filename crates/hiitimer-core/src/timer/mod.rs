mod controller;
mod countdown;
mod engine;
mod plan;
pub mod view;

pub use controller::{SessionHandle, SessionServices};
pub use countdown::{CountdownTimer, StepTimerState, DEFAULT_TICK_MS};
pub use engine::{
    Beeps, Completion, DialogState, LoadOutcome, PendingRecord, SessionEngine, SessionPhase,
    SessionSummary, SessionViewState, TickOutcome,
};
pub use plan::{Session, SessionSettings, Step, StepTiming, StepType, MAX_WORK_PERIODS};
pub use view::{CountDown, DisplaySnapshot, RunningSnapshot};
