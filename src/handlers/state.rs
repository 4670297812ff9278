use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::auth::middleware::AuthUser;
use crate::db::store;
use crate::dto::StateResponse;
use crate::error::{AppError, AppResult};
use crate::AppState;

pub async fn get_state(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<StateResponse>> {
    let mut conn = state.db.acquire().await?;
    let snapshot = store::fetch_user_state(&mut conn, auth_user.id, false)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    let status = snapshot.status(Utc::now().date_naive());
    Ok(Json(StateResponse {
        state: snapshot,
        status,
    }))
}
