//! Durable storage for [`UserState`] snapshots: one `profiles` row, the
//! user's `goals`, and one `logs` row per calendar date.

use chrono::{NaiveDate, Utc};
use sqlx::{types::Json, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::daily_log::{DailyLog, LogRow, LOG_COLUMNS};
use crate::models::goal::Goal;
use crate::models::user_state::{ProfileRow, UserState};

const PROFILE_COLUMNS: &str = "daily_target, streak, total_solved, last_sync, \
    tally_date, remote_solved_today, manual_solved_today";

/// Load a user's snapshot. `None` means no profile exists for `user_id`,
/// which is different from an existing profile with no activity.
///
/// With `for_update` the profile row stays locked until the surrounding
/// transaction ends, serialising state changes for that user.
pub async fn fetch_user_state(
    conn: &mut PgConnection,
    user_id: Uuid,
    for_update: bool,
) -> AppResult<Option<UserState>> {
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );

    let Some(profile) = sqlx::query_as::<_, ProfileRow>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let goals = sqlx::query_as::<_, Goal>(
        r#"
        SELECT id, goal_type, description, target_count, progress, deadline, unit
        FROM goals
        WHERE user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let logs = sqlx::query_as::<_, LogRow>(&format!(
        "SELECT {LOG_COLUMNS} FROM logs WHERE user_id = $1 ORDER BY log_date DESC"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(DailyLog::from)
    .collect();

    Ok(Some(profile.into_state(goals, logs)))
}

pub async fn create_profile(conn: &mut PgConnection, user_id: Uuid, daily_target: i32) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, daily_target, tally_date)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(daily_target)
    .bind(Utc::now().date_naive())
    .execute(conn)
    .await?;
    Ok(())
}

/// Write whatever differs between `before` and `after`.
pub async fn save_snapshot(
    conn: &mut PgConnection,
    user_id: Uuid,
    before: &UserState,
    after: &UserState,
) -> AppResult<()> {
    update_profile_stats(&mut *conn, user_id, after).await?;

    for goal in changed_goals(before, after) {
        update_goal_progress(&mut *conn, user_id, goal.id, goal.progress).await?;
    }

    for log in changed_logs(before, after) {
        upsert_log(&mut *conn, user_id, log).await?;
    }

    let dropped = dropped_days(before, after);
    if !dropped.is_empty() {
        sqlx::query("DELETE FROM logs WHERE user_id = $1 AND log_date = ANY($2)")
            .bind(user_id)
            .bind(&dropped)
            .execute(&mut *conn)
            .await?;
    }

    tracing::debug!(user_id = %user_id, dropped = dropped.len(), "Snapshot saved");
    Ok(())
}

pub async fn update_profile_stats(conn: &mut PgConnection, user_id: Uuid, state: &UserState) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE profiles SET
            total_solved = $2,
            streak = $3,
            daily_target = $4,
            last_sync = $5,
            tally_date = $6,
            remote_solved_today = $7,
            manual_solved_today = $8,
            updated_at = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(state.total_solved)
    .bind(state.streak)
    .bind(state.daily_target)
    .bind(state.last_sync)
    .bind(state.today.date)
    .bind(state.today.remote)
    .bind(state.today.manual)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_goal_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
    goal_id: Uuid,
    progress: i32,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE goals SET progress = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2",
    )
    .bind(goal_id)
    .bind(user_id)
    .bind(progress)
    .execute(conn)
    .await?;
    Ok(())
}

/// Insert the day's row or update it in place; never a second row per date.
pub async fn upsert_log(conn: &mut PgConnection, user_id: Uuid, log: &DailyLog) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO logs (id, user_id, log_date, solved_count, platform_breakdown, missed_target, reason_for_miss)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id, log_date) DO UPDATE SET
            solved_count = EXCLUDED.solved_count,
            platform_breakdown = EXCLUDED.platform_breakdown,
            missed_target = EXCLUDED.missed_target,
            reason_for_miss = EXCLUDED.reason_for_miss,
            updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(log.day())
    .bind(log.solved_count)
    .bind(Json(&log.platform_breakdown))
    .bind(log.missed_target)
    .bind(&log.reason_for_miss)
    .execute(conn)
    .await?;
    Ok(())
}

fn changed_goals<'a>(before: &UserState, after: &'a UserState) -> Vec<&'a Goal> {
    after
        .goals
        .iter()
        .filter(|g| {
            before
                .goals
                .iter()
                .find(|b| b.id == g.id)
                .map_or(true, |b| b.progress != g.progress)
        })
        .collect()
}

fn changed_logs<'a>(before: &UserState, after: &'a UserState) -> Vec<&'a DailyLog> {
    after
        .logs
        .iter()
        .filter(|l| before.log_for(l.day()) != Some(*l))
        .collect()
}

fn dropped_days(before: &UserState, after: &UserState) -> Vec<NaiveDate> {
    before
        .logs
        .iter()
        .map(DailyLog::day)
        .filter(|d| after.log_for(*d).is_none())
        .collect()
}
