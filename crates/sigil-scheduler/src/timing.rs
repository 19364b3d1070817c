//! Next-fire computation.

use chrono::{DateTime, Utc};

use crate::entry::ScheduleEntry;

/// When `entry` should fire next, as seen at `now`.
///
/// - `start` in the future: fire at `start`.
/// - never ran: fire now.
/// - otherwise the next slot is `last_run + frequency`; a slot that has
///   already passed fires now.
pub fn next_fire_at(entry: &ScheduleEntry, now: DateTime<Utc>) -> DateTime<Utc> {
    if entry.start > now {
        return entry.start;
    }
    let Some(last_run) = entry.last_run else {
        return now;
    };
    let next = entry
        .frequency_delta()
        .and_then(|freq| last_run.checked_add_signed(freq))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    next.max(now)
}

/// Delay before the first fire of a freshly started timer.
pub fn time_until_next_fire(entry: &ScheduleEntry, now: DateTime<Utc>) -> std::time::Duration {
    (next_fire_at(entry, now) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}
