//! # Reconciliation & streak engine
//!
//! Merges activity synced from the tracked remote platform with manually
//! entered activity, derives the lifetime solved count and the current
//! streak, and keeps goal progress in line with the total.
//!
//! Everything here is a pure transformation of a [`UserState`] snapshot.
//! The current instant is always an argument so callers (and tests) control
//! what "today" means.

mod merge;
mod reconcile;
mod streak;
mod target;

use serde::Deserialize;

use crate::models::daily_log::DailyLog;
use crate::models::user_state::{UserState, BASELINE_DAILY_TARGET};

pub use merge::merge_by_date;
pub use streak::compute_streak;

/// Engine settings shared by every operation.
#[derive(Debug, Clone)]
pub struct Engine {
    remote_platform: String,
    baseline_target: i32,
}

impl Engine {
    pub fn new(remote_platform: impl Into<String>, baseline_target: i32) -> Self {
        Self {
            remote_platform: remote_platform.into(),
            baseline_target,
        }
    }

    /// Breakdown key of the automatically synced platform.
    pub fn remote_platform(&self) -> &str {
        &self.remote_platform
    }

    pub fn baseline_target(&self) -> i32 {
        self.baseline_target
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new("LeetCode", BASELINE_DAILY_TARGET)
    }
}

/// One completed sync from the remote platform. `logs` is exhaustive for
/// that platform, never a delta.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSync {
    pub logs: Vec<DailyLog>,
    pub total_solved: i32,
    pub solved_today: i32,
}

/// Result of an operation that can complete the day's target.
#[derive(Debug, Clone)]
pub struct Applied {
    pub state: UserState,
    /// True only on the call that moved today's total from below the target
    /// to at or above it.
    pub celebrate: bool,
}

impl Applied {
    fn unchanged(state: UserState) -> Self {
        Self {
            state,
            celebrate: false,
        }
    }
}

fn crossed_target(before: i32, after: i32, target: i32) -> bool {
    before < target && after >= target
}
