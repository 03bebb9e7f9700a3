//! Interfaces to everything the session engine consumes but does not own.
//!
//! The engine reads settings and an exercise sequence once per attempt,
//! stamps finished sessions with the clock, hands them to a recorder, and
//! signals beeps. Storage-backed implementations live in [`crate::storage`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::exercise::{ExerciseEntry, User};
use crate::timer::SessionSettings;

/// One-shot source of session settings.
pub trait SettingsSource: Send {
    /// # Errors
    /// Any error is reported to the presentation layer as
    /// [`crate::ErrorCode::SettingsUnavailable`].
    fn session_settings(&self) -> Result<SessionSettings>;
}

/// Exercise sequence and participants for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPlan {
    pub entries: Vec<ExerciseEntry>,
    pub users: Vec<User>,
}

/// Resolves which exercises are performed, in which order, by whom.
pub trait ExerciseSource: Send {
    fn resolve(&mut self, settings: &SessionSettings) -> Result<ResolvedPlan>;
}

pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Summary of a finished session, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSessionRecord {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub user_ids: Vec<i64>,
}

/// Persists finished sessions.
pub trait SessionRecorder: Send {
    /// Returns the number of rows inserted.
    fn insert(&self, record: &NewSessionRecord) -> Result<usize>;
}

/// Sending half of the beep signal.
///
/// Holds at most one pending beep: signalling while a beep is still
/// pending is a no-op.
#[derive(Debug, Clone)]
pub struct BeepSignal {
    tx: mpsc::Sender<()>,
}

impl BeepSignal {
    /// Request one beep. Returns false if one was already pending.
    pub fn play(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Receiving half of the beep signal, held by the audio layer.
#[derive(Debug)]
pub struct BeepReceiver {
    rx: mpsc::Receiver<()>,
}

impl BeepReceiver {
    /// Wait for the next beep. `None` once every signal is dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Take the pending beep, if any.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

pub fn beep_channel() -> (BeepSignal, BeepReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (BeepSignal { tx }, BeepReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beep_signal_holds_a_single_pending_beep() {
        let (signal, mut receiver) = beep_channel();
        assert!(signal.play());
        assert!(!signal.play());
        assert!(receiver.try_recv());
        assert!(!receiver.try_recv());
        assert!(signal.play());
    }
}
