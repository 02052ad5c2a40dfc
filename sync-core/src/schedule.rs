//! Scheduling policy for periodic and foreground-triggered syncs.
//!
//! Pure decision functions; the coordinator owns the actual timers.

use std::time::Duration;

/// Period of the repeating sync timer.
pub const SYNC_TIMER_PERIOD: Duration = Duration::from_secs(15 * 60);

/// Minimum time since the last successful round before a foreground
/// return triggers a sync.
pub const FOREGROUND_MIN_DELAY: Duration = Duration::from_secs(5 * 60);

/// Debounce applied before a "sync soon" request actually runs.
pub const SYNC_SOON_DEBOUNCE: Duration = Duration::from_secs(10);

/// Decide whether returning to the foreground should trigger a sync.
///
/// Syncs when enough time has elapsed since the last finished round, when
/// no round has ever finished, or when the wall clock moved backwards
/// (`now < last_finish`): a negative elapsed time must not be allowed to
/// suppress syncing forever.
pub fn should_sync_on_resume(
    now_millis: u64,
    last_finish_millis: Option<u64>,
    min_delay: Duration,
) -> bool {
    match last_finish_millis {
        None => true,
        Some(last) => {
            if now_millis < last {
                // Clock moved backwards.
                return true;
            }
            now_millis - last >= min_delay.as_millis() as u64
        }
    }
}
