//! # hiitimer Core Library
//!
//! This library provides the core logic for the hiitimer interval-training
//! timer. All operations are available through the standalone CLI binary,
//! which is a thin presentation layer over the same core library.
//!
//! ## Architecture
//!
//! - **Step Plan**: Turns session settings and an exercise sequence into an
//!   ordered list of Prepare/Rest/Work steps, each annotated with the
//!   session time remaining once it ends
//! - **Countdown Timer**: A cancellable tokio task emitting the remaining
//!   session time once per tick
//! - **Session Engine**: A state machine that advances through the plan on
//!   every tick, handles pause/resume/abort, and computes the credited
//!   duration when a session ends
//! - **Storage**: SQLite-based session recording and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionHandle`]: Drives one session from the presentation layer
//! - [`Session`]: The built step plan
//! - [`Database`]: Session recording and statistics
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod exercise;
pub mod format;
pub mod ports;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, ErrorCode, ValidationError};
pub use events::Event;
pub use exercise::{Exercise, ExerciseEntry, ExerciseSelector, ExerciseSide, User};
pub use ports::{
    beep_channel, BeepReceiver, BeepSignal, Clock, ExerciseSource, NewSessionRecord, ResolvedPlan,
    SessionRecorder, SettingsSource, SystemClock,
};
pub use storage::{Config, ConfigFile, Database, SessionRecord, SessionStats};
pub use timer::{
    DialogState, Session, SessionHandle, SessionServices, SessionSettings, SessionViewState, Step,
    StepType,
};
