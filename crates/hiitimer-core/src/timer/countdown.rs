//! Whole-session countdown.
//!
//! A single background task counts a total duration down to zero and feeds
//! one receiver. Remaining time is computed from the monotonic clock and
//! quantised to whole tick periods, so a late wake-up never shifts later
//! ticks and the stream stays strictly decreasing.
//!
//! The countdown knows nothing about steps or exercises.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_TICK_MS: u64 = 1000;

const TICK_BUFFER: usize = 4;

/// One tick of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepTimerState {
    pub milli_seconds_remaining: u64,
    /// `milli_seconds_remaining / total`, 0 when the total is 0.
    pub remaining_percentage: f32,
}

impl StepTimerState {
    pub fn new(milli_seconds_remaining: u64, total_ms: u64) -> Self {
        let remaining_percentage = if total_ms == 0 {
            0.0
        } else {
            (milli_seconds_remaining as f64 / total_ms as f64) as f32
        };
        Self {
            milli_seconds_remaining,
            remaining_percentage,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.milli_seconds_remaining == 0
    }
}

/// Restartable countdown timer.
///
/// `start` always begins a fresh countdown; there is no internal resume.
/// Dropping the timer cancels it.
#[derive(Debug)]
pub struct CountdownTimer {
    tick_period: Duration,
    task: Option<JoinHandle<()>>,
    ticks: Option<mpsc::Receiver<StepTimerState>>,
}

impl CountdownTimer {
    pub fn new(tick_period: Duration) -> Self {
        Self {
            tick_period: tick_period.max(Duration::from_millis(1)),
            task: None,
            ticks: None,
        }
    }

    /// Start counting `total_ms` down, cancelling any countdown in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, total_ms: u64) {
        self.cancel();
        let (tx, rx) = mpsc::channel(TICK_BUFFER);
        debug!(total_ms, period_ms = self.tick_period.as_millis() as u64, "countdown started");
        self.task = Some(tokio::spawn(run_countdown(total_ms, self.tick_period, tx)));
        self.ticks = Some(rx);
    }

    /// Stop emitting and drop every tick not yet received.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("countdown cancelled");
        }
        self.ticks = None;
    }

    /// True while a countdown has been started and not cancelled or drained.
    pub fn is_active(&self) -> bool {
        self.ticks.is_some()
    }

    /// Next tick of the active countdown.
    ///
    /// Pends forever when no countdown is active, which makes it safe to
    /// poll from a `select!` loop. Returns `None` once the stream is
    /// exhausted after its terminal tick.
    pub async fn next_tick(&mut self) -> Option<StepTimerState> {
        match self.ticks.as_mut() {
            Some(rx) => {
                let tick = rx.recv().await;
                if tick.is_none() {
                    self.ticks = None;
                    self.task = None;
                }
                tick
            }
            None => std::future::pending::<Option<StepTimerState>>().await,
        }
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TICK_MS))
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_countdown(total_ms: u64, period: Duration, tx: mpsc::Sender<StepTimerState>) {
    let period_ms = (period.as_millis() as u64).max(1);
    let started = Instant::now();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_sent: Option<u64> = None;
    loop {
        interval.tick().await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let whole_periods = elapsed_ms / period_ms;
        let remaining = total_ms.saturating_sub(whole_periods.saturating_mul(period_ms));
        if last_sent.is_some_and(|prev| remaining >= prev) {
            continue;
        }
        last_sent = Some(remaining);

        if tx.send(StepTimerState::new(remaining, total_ms)).await.is_err() {
            break;
        }
        if remaining == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(timer: &mut CountdownTimer) -> Vec<u64> {
        let mut seen = Vec::new();
        while let Some(tick) = timer.next_tick().await {
            seen.push(tick.milli_seconds_remaining);
        }
        seen
    }

    #[test]
    fn percentage_of_zero_total_is_zero() {
        let state = StepTimerState::new(0, 0);
        assert_eq!(state.remaining_percentage, 0.0);
        assert!(state.is_terminal());
    }

    #[test]
    fn percentage_is_fraction_of_total() {
        let state = StepTimerState::new(15_000, 30_000);
        assert!((state.remaining_percentage - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_exact_zero() {
        let mut timer = CountdownTimer::default();
        timer.start(3_000);
        assert_eq!(drain(&mut timer).await, vec![3_000, 2_000, 1_000, 0]);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn uneven_total_still_ends_on_zero() {
        let mut timer = CountdownTimer::default();
        timer.start(2_500);
        assert_eq!(drain(&mut timer).await, vec![2_500, 1_500, 500, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_total_emits_terminal_once() {
        let mut timer = CountdownTimer::default();
        timer.start(0);
        let tick = timer.next_tick().await.unwrap();
        assert_eq!(tick, StepTimerState::new(0, 0));
        assert!(timer.next_tick().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_ticks() {
        let mut timer = CountdownTimer::default();
        timer.start(10_000);
        assert_eq!(timer.next_tick().await.unwrap().milli_seconds_remaining, 10_000);
        timer.cancel();
        assert!(!timer.is_active());
        let next = tokio::time::timeout(Duration::from_secs(5), timer.next_tick()).await;
        assert!(next.is_err(), "cancelled timer must not tick");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_begins_fresh() {
        let mut timer = CountdownTimer::default();
        timer.start(10_000);
        timer.next_tick().await;
        timer.next_tick().await;
        timer.start(2_000);
        assert_eq!(drain(&mut timer).await, vec![2_000, 1_000, 0]);
    }
}
