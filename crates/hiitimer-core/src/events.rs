use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::timer::StepType;

/// Every session lifecycle change produces an Event.
/// Per-tick display updates go through the view-state stream instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        attempt_id: Uuid,
        step_count: usize,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    StepAdvanced {
        attempt_id: Uuid,
        step_index: usize,
        step_type: StepType,
        at: DateTime<Utc>,
    },
    SessionPaused {
        attempt_id: Uuid,
        step_index: usize,
        at: DateTime<Utc>,
    },
    SessionResumed {
        attempt_id: Uuid,
        step_index: usize,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    SessionFinished {
        attempt_id: Uuid,
        duration_ms: u64,
        work_steps: usize,
        /// False when nothing was credited or the recorder failed.
        recorded: bool,
        at: DateTime<Utc>,
    },
    SessionFailed {
        attempt_id: Uuid,
        code: ErrorCode,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
}
