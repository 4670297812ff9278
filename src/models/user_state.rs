use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::daily_log::DailyLog;
use super::goal::Goal;

/// Daily target a user returns to once an elevated catch-up target is met.
pub const BASELINE_DAILY_TARGET: i32 = 3;

/// Snapshot of everything the engine reads and writes for one user.
///
/// Operations take a snapshot by value and hand back a new one; nothing
/// mutates a snapshot another reader might hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub daily_target: i32,
    pub streak: i32,
    pub total_solved: i32,
    pub last_sync: Option<DateTime<Utc>>,
    pub goals: Vec<Goal>,
    pub logs: Vec<DailyLog>,
    pub today: TodayTally,
}

impl UserState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            daily_target: BASELINE_DAILY_TARGET,
            streak: 0,
            total_solved: 0,
            last_sync: None,
            goals: Vec::new(),
            logs: Vec::new(),
            today: TodayTally::empty(today),
        }
    }

    pub fn log_for(&self, day: NaiveDate) -> Option<&DailyLog> {
        self.logs.iter().find(|l| l.day() == day)
    }

    pub fn status(&self, today: NaiveDate) -> TodayStatus {
        let tally = self.today.rolled_to(today);
        let total = tally.total();
        TodayStatus {
            date: today,
            remote: tally.remote,
            manual: tally.manual,
            total,
            target: self.daily_target,
            target_met: total >= self.daily_target,
        }
    }
}

/// Per-day running counters, split by source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayTally {
    pub date: NaiveDate,
    pub remote: i32,
    pub manual: i32,
}

impl TodayTally {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            remote: 0,
            manual: 0,
        }
    }

    /// Counters for `day`; a tally from an earlier day starts over at zero.
    pub fn rolled_to(self, day: NaiveDate) -> Self {
        if self.date == day {
            self
        } else {
            Self::empty(day)
        }
    }

    pub fn total(&self) -> i32 {
        self.remote + self.manual
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TodayStatus {
    pub date: NaiveDate,
    pub remote: i32,
    pub manual: i32,
    pub total: i32,
    pub target: i32,
    pub target_met: bool,
}

/// Row shape of the `profiles` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub daily_target: i32,
    pub streak: i32,
    pub total_solved: i32,
    pub last_sync: Option<DateTime<Utc>>,
    pub tally_date: NaiveDate,
    pub remote_solved_today: i32,
    pub manual_solved_today: i32,
}

impl ProfileRow {
    pub fn into_state(self, goals: Vec<Goal>, logs: Vec<DailyLog>) -> UserState {
        UserState {
            daily_target: self.daily_target,
            streak: self.streak,
            total_solved: self.total_solved,
            last_sync: self.last_sync,
            goals,
            logs,
            today: TodayTally {
                date: self.tally_date,
                remote: self.remote_solved_today,
                manual: self.manual_solved_today,
            },
        }
    }
}
