use chrono::{DateTime, Duration, Utc};

use crate::models::daily_log::DailyLog;

const DAY_MS: i64 = 86_400_000;

/// Current consecutive-day streak as of `now`.
///
/// The walk starts at the most recent entry, which must be today with a
/// positive count or yesterday with any count. From there each next-older
/// entry extends the streak only if it sits exactly one day (rounded up) from
/// the previous one. The first gap of any other size ends the walk, even if an
/// older run would be longer.
pub fn compute_streak(logs: &[DailyLog], now: DateTime<Utc>) -> i32 {
    let mut sorted: Vec<&DailyLog> = logs.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let Some((anchor, rest)) = sorted.split_first() else {
        return 0;
    };

    let today = now.date_naive();
    let yesterday = (now - Duration::days(1)).date_naive();
    let anchored = (anchor.day() == today && anchor.solved_count > 0) || anchor.day() == yesterday;
    if !anchored {
        return 0;
    }

    let mut streak = 1;
    let mut expected = anchor.date;
    for log in rest {
        if day_gap(expected, log.date) != 1 {
            break;
        }
        streak += 1;
        expected = log.date;
    }
    streak
}

/// Whole days between two instants, rounded up.
fn day_gap(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    let ms = (a - b).num_milliseconds().abs();
    (ms + DAY_MS - 1) / DAY_MS
}
