use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::daily_log::{DailyLog, LogQuery, LogRow, LOG_COLUMNS};
use crate::AppState;

/// Activity history, newest first. `missed=true` lists the days that were
/// accepted as misses, with their reasons.
pub async fn list_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<DailyLog>>> {
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::Validation("start_date must not be after end_date".into()));
        }
    }

    let logs = sqlx::query_as::<_, LogRow>(&format!(
        r#"
        SELECT {LOG_COLUMNS} FROM logs
        WHERE user_id = $1
          AND ($2::date IS NULL OR log_date >= $2)
          AND ($3::date IS NULL OR log_date <= $3)
          AND ($4::bool IS NULL OR missed_target = $4)
        ORDER BY log_date DESC
        "#
    ))
    .bind(auth_user.id)
    .bind(query.start_date)
    .bind(query.end_date)
    .bind(query.missed)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(DailyLog::from)
    .collect();

    Ok(Json(logs))
}
