//! Human-readable renderings of millisecond durations.

const MS_PER_SECOND: u64 = 1000;
const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

/// Render a duration as `"1h 02min 03s"`, dropping leading zero units.
///
/// Sub-second remainders are truncated. Zero renders as `"0s"`.
pub fn format_duration_ms(duration_ms: u64) -> String {
    let total_secs = duration_ms / MS_PER_SECOND;
    let hours = total_secs / SECONDS_PER_HOUR;
    let minutes = (total_secs % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let seconds = total_secs % SECONDS_PER_MINUTE;

    if hours > 0 {
        format!("{hours}h {minutes:02}min {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}min {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Render a running clock as `mm:ss`, or `h:mm:ss` past the hour.
///
/// Rounds up to the next whole second so a clock never shows `00:00`
/// while time is still left.
pub fn format_clock_ms(remaining_ms: u64) -> String {
    let total_secs = remaining_ms.div_ceil(MS_PER_SECOND);
    let hours = total_secs / SECONDS_PER_HOUR;
    let minutes = (total_secs % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let seconds = total_secs % SECONDS_PER_MINUTE;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Whole seconds contained in `ms`, as shown by the "3-2-1" countdown.
pub fn whole_seconds(ms: u64) -> String {
    (ms / MS_PER_SECOND).to_string()
}
