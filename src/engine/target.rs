use chrono::{DateTime, Utc};

use super::Engine;
use crate::models::daily_log::{day_start, DailyLog};
use crate::models::user_state::UserState;

impl Engine {
    /// Roll today's shortfall into the daily target and mark today as missed.
    pub fn adjust_target_for_miss(
        &self,
        state: UserState,
        deficit: i32,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> UserState {
        let today = now.date_naive();
        let reason = reason.filter(|r| !r.trim().is_empty());
        let mut next = state;

        next.daily_target += deficit.max(0);
        next.today = next.today.rolled_to(today);

        match next.logs.iter_mut().find(|l| l.day() == today) {
            Some(log) => {
                log.missed_target = true;
                log.reason_for_miss = reason;
            }
            None => {
                // carries today's manual count so the next reconcile re-adds it exactly
                let mut log = DailyLog::manual(day_start(today), next.today.manual, &self.remote_platform);
                log.missed_target = true;
                log.reason_for_miss = reason;
                next.logs.push(log);
            }
        }

        next
    }

    /// Drop an elevated target back to the baseline.
    pub fn reset_target_after_catch_up(&self, state: UserState) -> UserState {
        if state.daily_target > self.baseline_target {
            UserState {
                daily_target: self.baseline_target,
                ..state
            }
        } else {
            state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{manual, now, remote, today, LC};
    use crate::models::daily_log::Origin;

    fn engine() -> Engine {
        Engine::default()
    }

    #[test]
    fn test_deficit_raises_target() {
        let state = UserState::new(today());
        let state = engine().adjust_target_for_miss(state, 2, Some("busy".into()), now());
        assert_eq!(state.daily_target, 5);
    }

    #[test]
    fn test_miss_creates_manual_entry_when_absent() {
        let mut state = UserState::new(today());
        state.logs = vec![remote(1, 3)];
        let state = engine().adjust_target_for_miss(state, 3, Some("sick".into()), now());

        assert_eq!(state.logs.len(), 2);
        let log = state.log_for(today()).unwrap();
        assert!(log.missed_target);
        assert_eq!(log.reason_for_miss.as_deref(), Some("sick"));
        assert_eq!(log.origin(LC), Origin::Manual);
        assert_eq!(log.solved_count, 0);
    }

    #[test]
    fn test_miss_marks_existing_entry() {
        let mut state = UserState::new(today());
        state.logs = vec![manual(0, 1)];
        let state = engine().adjust_target_for_miss(state, 2, Some("travel".into()), now());

        assert_eq!(state.logs.len(), 1);
        assert!(state.logs[0].missed_target);
        assert_eq!(state.logs[0].solved_count, 1);
        assert_eq!(state.logs[0].reason_for_miss.as_deref(), Some("travel"));
    }

    #[test]
    fn test_blank_reason_is_not_recorded() {
        let state = engine().adjust_target_for_miss(UserState::new(today()), 1, Some("   ".into()), now());
        let log = state.log_for(today()).unwrap();
        assert!(log.missed_target);
        assert!(log.reason_for_miss.is_none());
    }

    #[test]
    fn test_negative_deficit_leaves_target() {
        let state = engine().adjust_target_for_miss(UserState::new(today()), -4, None, now());
        assert_eq!(state.daily_target, 3);
    }

    #[test]
    fn test_reset_returns_to_baseline() {
        let mut state = UserState::new(today());
        state.daily_target = 6;
        let state = engine().reset_target_after_catch_up(state);
        assert_eq!(state.daily_target, 3);
    }

    #[test]
    fn test_reset_leaves_baseline_target_alone() {
        let mut state = UserState::new(today());
        state.daily_target = 2;
        let state = engine().reset_target_after_catch_up(state);
        assert_eq!(state.daily_target, 2);
    }
}
