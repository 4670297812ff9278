use chrono::{DateTime, Utc};

use super::{crossed_target, merge_by_date, compute_streak, Applied, Engine, RemoteSync};
use crate::models::daily_log::{day_start, DailyLog};
use crate::models::user_state::{TodayTally, UserState};

impl Engine {
    /// Record `count` problems solved today on a platform that is not synced.
    ///
    /// Today's entry is created or extended; earlier days are left alone.
    /// Non-positive counts change nothing.
    pub fn apply_manual_increment(&self, state: UserState, count: i32, now: DateTime<Utc>) -> Applied {
        if count <= 0 {
            return Applied::unchanged(state);
        }

        let today = now.date_naive();
        let mut next = state;

        let tally = next.today.rolled_to(today);
        let before = tally.total();
        next.today = TodayTally {
            manual: tally.manual.saturating_add(count),
            ..tally
        };

        next.total_solved = next.total_solved.saturating_add(count);
        for goal in next.goals.iter_mut().filter(|g| g.goal_type.tracks_total()) {
            goal.progress = goal.progress.saturating_add(count);
        }

        let entry = DailyLog::manual(day_start(today), count, &self.remote_platform);
        match next.logs.iter_mut().find(|l| l.day() == today) {
            Some(existing) => existing.absorb(entry),
            None => next.logs.push(entry),
        }

        let celebrate = crossed_target(before, next.today.total(), next.daily_target);
        Applied {
            state: next,
            celebrate,
        }
    }

    /// Replace everything previously learned from the remote platform with
    /// `sync`, keeping manual activity, and recompute the derived figures.
    pub fn reconcile_remote_sync(&self, state: UserState, sync: RemoteSync, now: DateTime<Utc>) -> Applied {
        let remote = self.remote_platform.as_str();
        let today = now.date_naive();

        let retained: Vec<DailyLog> = state
            .logs
            .iter()
            .filter_map(|l| l.manual_projection(remote))
            .collect();
        let manual_total = retained
            .iter()
            .fold(0i32, |acc, l| acc.saturating_add(l.solved_count));
        let total_solved = sync.total_solved.saturating_add(manual_total);

        let logs = merge_by_date(sync.logs.into_iter().chain(retained));
        let streak = compute_streak(&logs, now);

        let goals = state
            .goals
            .into_iter()
            .map(|mut g| {
                if g.goal_type.tracks_total() {
                    g.progress = total_solved;
                }
                g
            })
            .collect();

        let tally = state.today.rolled_to(today);
        let before = tally.total();
        let today_tally = TodayTally {
            remote: sync.solved_today,
            ..tally
        };
        let celebrate = crossed_target(before, today_tally.total(), state.daily_target);

        tracing::debug!(
            total_solved,
            manual_total,
            streak,
            logs = logs.len(),
            "Remote sync reconciled"
        );

        Applied {
            state: UserState {
                daily_target: state.daily_target,
                streak,
                total_solved,
                last_sync: Some(now),
                goals,
                logs,
                today: today_tally,
            },
            celebrate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{days_ago, goal, manual, now, remote, today, LC};
    use crate::models::daily_log::{Origin, MANUAL_PLATFORM};
    use crate::models::goal::GoalType;
    use std::collections::HashSet;

    fn engine() -> Engine {
        Engine::default()
    }

    fn state_with_goals() -> UserState {
        let mut state = UserState::new(today());
        state.goals = vec![
            goal(GoalType::ShortTerm, 0),
            goal(GoalType::LongTerm, 0),
            goal(GoalType::Other, 7),
        ];
        state
    }

    fn sync(logs: Vec<DailyLog>, total_solved: i32, solved_today: i32) -> RemoteSync {
        RemoteSync {
            logs,
            total_solved,
            solved_today,
        }
    }

    // ── manual increments ────────────────────────────────────────────────

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let mut state = state_with_goals();
        state.logs = vec![manual(1, 1)];

        let synced = engine()
            .reconcile_remote_sync(state, sync(vec![], i32::MAX, 0), now())
            .state;
        assert_eq!(synced.total_solved, i32::MAX);
        assert_eq!(synced.goals[0].progress, i32::MAX);

        let bumped = engine().apply_manual_increment(synced, 5, now()).state;
        assert_eq!(bumped.total_solved, i32::MAX);
        assert_eq!(bumped.goals[1].progress, i32::MAX);
    }

    #[test]
    fn test_zero_increment_is_noop() {
        let mut state = state_with_goals();
        state.total_solved = 10;
        state.streak = 4;
        let applied = engine().apply_manual_increment(state.clone(), 0, now());
        assert_eq!(applied.state, state);
        assert!(!applied.celebrate);
    }

    #[test]
    fn test_negative_increment_is_noop() {
        let state = state_with_goals();
        let applied = engine().apply_manual_increment(state.clone(), -2, now());
        assert_eq!(applied.state, state);
    }

    #[test]
    fn test_increment_updates_total_goals_and_tally() {
        let applied = engine().apply_manual_increment(state_with_goals(), 2, now());
        let state = applied.state;

        assert_eq!(state.total_solved, 2);
        assert_eq!(state.today.manual, 2);
        assert_eq!(state.goals[0].progress, 2);
        assert_eq!(state.goals[1].progress, 2);
        assert_eq!(state.goals[2].progress, 7);

        assert_eq!(state.logs.len(), 1);
        let log = &state.logs[0];
        assert_eq!(log.day(), today());
        assert_eq!(log.origin(LC), Origin::Manual);
        assert!(!log.missed_target);
    }

    #[test]
    fn test_increments_are_additive() {
        let engine = engine();
        let mut state = state_with_goals();
        state.total_solved = 40;
        for count in [1, 4, 2] {
            state = engine.apply_manual_increment(state, count, now()).state;
        }
        assert_eq!(state.total_solved, 47);

        let mut split = state_with_goals();
        split.total_solved = 40;
        split = engine.apply_manual_increment(split, 7, now()).state;
        assert_eq!(split.total_solved, state.total_solved);
        assert_eq!(split.logs, state.logs);
    }

    #[test]
    fn test_repeat_increments_share_todays_entry() {
        let engine = engine();
        let mut state = state_with_goals();
        state = engine.apply_manual_increment(state, 1, now()).state;
        state = engine.apply_manual_increment(state, 2, now()).state;
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs[0].solved_count, 3);
        assert_eq!(state.logs[0].platform_breakdown.get(MANUAL_PLATFORM), Some(&3));
    }

    #[test]
    fn test_increment_leaves_earlier_days_alone() {
        let mut state = state_with_goals();
        state.logs = vec![remote(1, 3), manual(2, 1)];
        let before = state.logs.clone();
        let state = engine().apply_manual_increment(state, 2, now()).state;
        assert_eq!(&state.logs[..2], &before[..]);
        assert_eq!(state.logs.len(), 3);
    }

    #[test]
    fn test_increment_merges_into_synced_entry_for_today() {
        let mut state = state_with_goals();
        state.logs = vec![remote(0, 2)];
        let state = engine().apply_manual_increment(state, 1, now()).state;
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs[0].solved_count, 3);
        assert_eq!(state.logs[0].platform_breakdown.get(LC), Some(&2));
    }

    #[test]
    fn test_increment_celebrates_only_when_crossing() {
        let engine = engine();
        let state = state_with_goals();

        let first = engine.apply_manual_increment(state, 2, now());
        assert!(!first.celebrate);
        let second = engine.apply_manual_increment(first.state, 1, now());
        assert!(second.celebrate);
        let third = engine.apply_manual_increment(second.state, 1, now());
        assert!(!third.celebrate);
    }

    #[test]
    fn test_increment_counts_remote_progress_toward_target() {
        let mut state = state_with_goals();
        state.today.remote = 2;
        let applied = engine().apply_manual_increment(state, 1, now());
        assert!(applied.celebrate);
        assert_eq!(applied.state.status(today()).total, 3);
    }

    #[test]
    fn test_increment_after_midnight_starts_fresh_tally() {
        let mut state = state_with_goals();
        state.today = TodayTally {
            date: days_ago(1),
            remote: 5,
            manual: 5,
        };
        let applied = engine().apply_manual_increment(state, 1, now());
        assert_eq!(applied.state.today, TodayTally { date: today(), remote: 0, manual: 1 });
        assert!(!applied.celebrate);
    }

    // ── remote reconciliation ────────────────────────────────────────────

    #[test]
    fn test_total_is_remote_plus_retained_manual() {
        let mut state = state_with_goals();
        state.logs = vec![remote(1, 9), manual(3, 2), manual(5, 4)];
        state.total_solved = 999;

        let applied = engine().reconcile_remote_sync(
            state,
            sync(vec![remote(0, 1), remote(1, 2)], 120, 1),
            now(),
        );
        assert_eq!(applied.state.total_solved, 126);
    }

    #[test]
    fn test_previous_remote_entries_are_superseded() {
        let mut state = state_with_goals();
        state.logs = vec![remote(4, 9), remote(6, 2)];

        let applied = engine().reconcile_remote_sync(state, sync(vec![remote(0, 1)], 50, 1), now());
        let days: Vec<_> = applied.state.logs.iter().map(|l| l.day()).collect();
        assert_eq!(days, vec![today()]);
        assert_eq!(applied.state.total_solved, 50);
    }

    #[test]
    fn test_manual_share_of_combined_entry_survives_resync() {
        let engine = engine();
        let mut state = state_with_goals();
        state = engine
            .reconcile_remote_sync(state, sync(vec![remote(0, 2)], 20, 2), now())
            .state;
        state = engine.apply_manual_increment(state, 3, now()).state;
        assert_eq!(state.total_solved, 23);

        let state = engine
            .reconcile_remote_sync(state, sync(vec![remote(0, 4)], 22, 4), now())
            .state;
        assert_eq!(state.total_solved, 25);
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs[0].solved_count, 7);
        assert_eq!(state.logs[0].platform_breakdown.get(LC), Some(&4));
        assert_eq!(state.logs[0].platform_breakdown.get(MANUAL_PLATFORM), Some(&3));
    }

    #[test]
    fn test_one_log_per_date_after_reconcile() {
        let mut state = state_with_goals();
        state.logs = vec![manual(0, 1), manual(1, 2), manual(4, 1)];

        let applied = engine().reconcile_remote_sync(
            state,
            sync(vec![remote(0, 3), remote(1, 1), remote(2, 1)], 30, 3),
            now(),
        );
        let logs = &applied.state.logs;
        let days: HashSet<_> = logs.iter().map(|l| l.day()).collect();
        assert_eq!(days.len(), logs.len());
        assert_eq!(logs.len(), 4);
    }

    #[test]
    fn test_streak_uses_remote_and_manual_days() {
        let mut state = state_with_goals();
        // manual activity fills the hole at day 1
        state.logs = vec![manual(1, 1)];

        let applied = engine().reconcile_remote_sync(
            state,
            sync(vec![remote(0, 2), remote(2, 1), remote(3, 1)], 10, 2),
            now(),
        );
        assert_eq!(applied.state.streak, 4);
    }

    #[test]
    fn test_goals_follow_new_total() {
        let mut state = state_with_goals();
        state.logs = vec![manual(2, 5)];

        let applied = engine().reconcile_remote_sync(state, sync(vec![], 40, 0), now());
        let goals = &applied.state.goals;
        assert_eq!(goals[0].progress, 45);
        assert_eq!(goals[1].progress, 45);
        assert_eq!(goals[2].progress, 7);
    }

    #[test]
    fn test_reconcile_stamps_last_sync_and_remote_tally() {
        let applied = engine().reconcile_remote_sync(state_with_goals(), sync(vec![remote(0, 2)], 2, 2), now());
        assert_eq!(applied.state.last_sync, Some(now()));
        assert_eq!(applied.state.today.remote, 2);
    }

    #[test]
    fn test_reconcile_celebrates_on_crossing_only() {
        let engine = engine();
        let mut state = state_with_goals();
        state.today.manual = 1;

        let first = engine.reconcile_remote_sync(state, sync(vec![remote(0, 2)], 2, 2), now());
        assert!(first.celebrate);

        let again = engine.reconcile_remote_sync(first.state, sync(vec![remote(0, 3)], 3, 3), now());
        assert!(!again.celebrate);
    }

    #[test]
    fn test_reconcile_keeps_miss_record_on_synced_day() {
        let mut state = state_with_goals();
        let mut missed = remote(1, 1);
        missed.missed_target = true;
        missed.reason_for_miss = Some("interview prep".into());
        state.logs = vec![missed];

        let applied = engine().reconcile_remote_sync(state, sync(vec![remote(1, 1)], 1, 0), now());
        let log = applied.state.log_for(days_ago(1)).unwrap();
        assert!(log.missed_target);
        assert_eq!(log.reason_for_miss.as_deref(), Some("interview prep"));
        assert_eq!(log.solved_count, 1);
        assert_eq!(applied.state.total_solved, 1);
    }

    #[test]
    fn test_reconcile_with_empty_history() {
        let applied = engine().reconcile_remote_sync(UserState::new(today()), sync(vec![], 0, 0), now());
        assert_eq!(applied.state.total_solved, 0);
        assert_eq!(applied.state.streak, 0);
        assert!(applied.state.logs.is_empty());
        assert!(!applied.celebrate);
    }
}
