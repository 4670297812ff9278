use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

/// Platform key → problems solved on that platform for the day.
pub type PlatformBreakdown = BTreeMap<String, i32>;

/// Breakdown key that hand-entered (non-synced) problems are filed under.
pub const MANUAL_PLATFORM: &str = "Other";

/// Midnight UTC of `day`, the canonical timestamp for a day's entry.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// One calendar day's activity. The calendar date of `date` (UTC) is the
/// day's identity; at most one entry per date survives a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: DateTime<Utc>,
    pub solved_count: i32,
    #[serde(default)]
    pub platform_breakdown: PlatformBreakdown,
    #[serde(default)]
    pub missed_target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_miss: Option<String>,
}

/// Where a day's activity came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Origin {
    Manual,
    Remote { platform: String },
}

impl DailyLog {
    /// A manual entry: the remote platform's slot is pinned to zero.
    pub fn manual(date: DateTime<Utc>, count: i32, remote_platform: &str) -> Self {
        let mut platform_breakdown = PlatformBreakdown::new();
        platform_breakdown.insert(remote_platform.to_string(), 0);
        if count > 0 {
            platform_breakdown.insert(MANUAL_PLATFORM.to_string(), count);
        }
        Self {
            date,
            solved_count: count.max(0),
            platform_breakdown,
            missed_target: false,
            reason_for_miss: None,
        }
    }

    /// A remote-sourced entry attributing the whole count to `remote_platform`.
    pub fn remote(date: DateTime<Utc>, count: i32, remote_platform: &str) -> Self {
        let mut platform_breakdown = PlatformBreakdown::new();
        platform_breakdown.insert(remote_platform.to_string(), count.max(0));
        Self {
            date,
            solved_count: count.max(0),
            platform_breakdown,
            missed_target: false,
            reason_for_miss: None,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    /// `YYYY-MM-DD` key used for per-day identity.
    pub fn day_key(&self) -> String {
        self.day().format("%Y-%m-%d").to_string()
    }

    pub fn remote_share(&self, remote_platform: &str) -> i32 {
        self.platform_breakdown
            .get(remote_platform)
            .copied()
            .unwrap_or(0)
            .max(0)
    }

    pub fn manual_share(&self, remote_platform: &str) -> i32 {
        (self.solved_count - self.remote_share(remote_platform)).max(0)
    }

    /// Manual iff the remote platform's slot is zero or absent.
    pub fn origin(&self, remote_platform: &str) -> Origin {
        if self.remote_share(remote_platform) == 0 {
            Origin::Manual
        } else {
            Origin::Remote {
                platform: remote_platform.to_string(),
            }
        }
    }

    /// The part of this entry that the remote platform knows nothing about.
    ///
    /// Manual entries come back untouched. Entries that absorbed a remote
    /// count are reduced to their manual share, which is kept only when it is
    /// positive or the day carries a miss record.
    pub fn manual_projection(&self, remote_platform: &str) -> Option<DailyLog> {
        match self.origin(remote_platform) {
            Origin::Manual => Some(self.clone()),
            Origin::Remote { .. } => {
                let manual = self.manual_share(remote_platform);
                if manual == 0 && !self.missed_target {
                    return None;
                }
                let mut platform_breakdown = self.platform_breakdown.clone();
                platform_breakdown.insert(remote_platform.to_string(), 0);
                Some(DailyLog {
                    date: self.date,
                    solved_count: manual,
                    platform_breakdown,
                    missed_target: self.missed_target,
                    reason_for_miss: self.reason_for_miss.clone(),
                })
            }
        }
    }

    /// Fold another entry for the same day into this one.
    pub fn absorb(&mut self, other: DailyLog) {
        self.solved_count = self.solved_count.saturating_add(other.solved_count);
        for (platform, count) in other.platform_breakdown {
            let slot = self.platform_breakdown.entry(platform).or_insert(0);
            *slot = slot.saturating_add(count);
        }
        self.missed_target |= other.missed_target;
        if self.reason_for_miss.is_none() {
            self.reason_for_miss = other.reason_for_miss;
        }
    }
}

/// Columns of the `logs` table that make up a [`DailyLog`].
pub const LOG_COLUMNS: &str = "log_date, solved_count, platform_breakdown, missed_target, reason_for_miss";

/// Row shape of [`LOG_COLUMNS`].
#[derive(Debug, Clone, FromRow)]
pub struct LogRow {
    pub log_date: NaiveDate,
    pub solved_count: i32,
    pub platform_breakdown: Json<PlatformBreakdown>,
    pub missed_target: bool,
    pub reason_for_miss: Option<String>,
}

impl From<LogRow> for DailyLog {
    fn from(row: LogRow) -> Self {
        Self {
            date: day_start(row.log_date),
            solved_count: row.solved_count,
            platform_breakdown: row.platform_breakdown.0,
            missed_target: row.missed_target,
            reason_for_miss: row.reason_for_miss,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Only days that ended below target.
    pub missed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LC: &str = "LeetCode";

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_manual_entry_pins_remote_slot_to_zero() {
        let log = DailyLog::manual(at(2026, 3, 1), 2, LC);
        assert_eq!(log.platform_breakdown.get(LC), Some(&0));
        assert_eq!(log.platform_breakdown.get(MANUAL_PLATFORM), Some(&2));
        assert_eq!(log.origin(LC), Origin::Manual);
    }

    #[test]
    fn test_missing_remote_key_counts_as_manual() {
        let mut log = DailyLog::manual(at(2026, 3, 1), 1, LC);
        log.platform_breakdown.clear();
        assert_eq!(log.origin(LC), Origin::Manual);
    }

    #[test]
    fn test_remote_entry_origin() {
        let log = DailyLog::remote(at(2026, 3, 1), 4, LC);
        assert_eq!(
            log.origin(LC),
            Origin::Remote {
                platform: LC.to_string()
            }
        );
        assert_eq!(log.manual_share(LC), 0);
    }

    #[test]
    fn test_projection_drops_pure_remote_entry() {
        let log = DailyLog::remote(at(2026, 3, 1), 4, LC);
        assert!(log.manual_projection(LC).is_none());
    }

    #[test]
    fn test_projection_keeps_manual_share_of_combined_entry() {
        let mut log = DailyLog::remote(at(2026, 3, 1), 4, LC);
        log.absorb(DailyLog::manual(at(2026, 3, 1), 3, LC));
        assert_eq!(log.solved_count, 7);

        let projected = log.manual_projection(LC).unwrap();
        assert_eq!(projected.solved_count, 3);
        assert_eq!(projected.origin(LC), Origin::Manual);
        assert_eq!(projected.platform_breakdown.get(MANUAL_PLATFORM), Some(&3));
    }

    #[test]
    fn test_projection_keeps_miss_record_without_manual_share() {
        let mut log = DailyLog::remote(at(2026, 3, 1), 1, LC);
        log.missed_target = true;
        log.reason_for_miss = Some("exam".into());

        let projected = log.manual_projection(LC).unwrap();
        assert_eq!(projected.solved_count, 0);
        assert!(projected.missed_target);
        assert_eq!(projected.reason_for_miss.as_deref(), Some("exam"));
    }

    #[test]
    fn test_absorb_keeps_first_reason() {
        let mut a = DailyLog::manual(at(2026, 3, 1), 1, LC);
        a.missed_target = true;
        a.reason_for_miss = Some("first".into());
        let mut b = DailyLog::manual(at(2026, 3, 1), 1, LC);
        b.missed_target = true;
        b.reason_for_miss = Some("second".into());
        a.absorb(b);
        assert_eq!(a.reason_for_miss.as_deref(), Some("first"));
        assert_eq!(a.platform_breakdown.get(MANUAL_PLATFORM), Some(&2));
    }

    #[test]
    fn test_absorb_saturates() {
        let mut a = DailyLog::remote(at(2026, 3, 1), i32::MAX, LC);
        a.absorb(DailyLog::remote(at(2026, 3, 1), 1, LC));
        assert_eq!(a.solved_count, i32::MAX);
        assert_eq!(a.platform_breakdown.get(LC), Some(&i32::MAX));
    }

    #[test]
    fn test_day_key_format() {
        let log = DailyLog::manual(at(2026, 3, 7), 1, LC);
        assert_eq!(log.day_key(), "2026-03-07");
    }

    #[test]
    fn test_row_conversion_anchors_at_midnight() {
        let row = LogRow {
            log_date: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
            solved_count: 2,
            platform_breakdown: Json(PlatformBreakdown::from([(LC.to_string(), 0)])),
            missed_target: false,
            reason_for_miss: None,
        };
        let log = DailyLog::from(row);
        assert_eq!(log.date, Utc.with_ymd_and_hms(2026, 3, 7, 0, 0, 0).unwrap());
        assert_eq!(log.origin(LC), Origin::Manual);
    }
}
