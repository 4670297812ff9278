use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::{CreateGoalRequest, DeleteResponse, UpdateGoalRequest};
use crate::error::{AppError, AppResult};
use crate::models::goal::Goal;
use crate::AppState;

const GOAL_COLUMNS: &str = "id, goal_type, description, target_count, progress, deadline, unit";

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Goal>>> {
    let goals = sqlx::query_as::<_, Goal>(&format!(
        "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = $1 ORDER BY created_at ASC"
    ))
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(goals))
}

/// Term goals start from the current lifetime total; later syncs and
/// manual entries keep them in step with it.
pub async fn create_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateGoalRequest>,
) -> AppResult<Json<Goal>> {
    body.validate()?;

    let total_solved = sqlx::query_scalar::<_, i32>("SELECT total_solved FROM profiles WHERE user_id = $1")
        .bind(auth_user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    let progress = if body.goal_type.tracks_total() { total_solved } else { 0 };

    let goal = sqlx::query_as::<_, Goal>(&format!(
        r#"
        INSERT INTO goals (id, user_id, goal_type, description, target_count, progress, deadline, unit)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {GOAL_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.goal_type)
    .bind(body.description.trim())
    .bind(body.target_count)
    .bind(progress)
    .bind(body.deadline)
    .bind(body.unit.as_deref().unwrap_or("problems"))
    .fetch_one(&state.db)
    .await?;

    tracing::debug!(user_id = %auth_user.id, goal_id = %goal.id, "Goal created");
    Ok(Json(goal))
}

/// Progress is owned by the engine and cannot be edited here.
pub async fn update_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
    Json(body): Json<UpdateGoalRequest>,
) -> AppResult<Json<Goal>> {
    body.validate()?;
    if body.is_empty() {
        return Err(AppError::Validation("Nothing to update".into()));
    }

    let goal = sqlx::query_as::<_, Goal>(&format!(
        r#"
        UPDATE goals SET
            description = COALESCE($3, description),
            target_count = COALESCE($4, target_count),
            deadline = COALESCE($5, deadline),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {GOAL_COLUMNS}
        "#
    ))
    .bind(goal_id)
    .bind(auth_user.id)
    .bind(body.description.as_deref().map(str::trim))
    .bind(body.target_count)
    .bind(body.deadline)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Goal not found".into()))?;

    Ok(Json(goal))
}

pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
        .bind(goal_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Goal not found".into()));
    }

    Ok(Json(DeleteResponse {
        deleted: true,
        id: goal_id,
    }))
}
