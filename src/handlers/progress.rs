//! State-changing progress endpoints.
//!
//! Every call runs as one transaction: lock the profile row, hand the
//! snapshot to the engine, write back the difference, commit. Target
//! completion is pushed to connected sockets after the commit.

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::db::store;
use crate::dto::{FetchSyncRequest, ManualIncrementRequest, MissRequest, ProgressResponse, SyncRequest};
use crate::engine::{Applied, Engine, RemoteSync};
use crate::error::{AppError, AppResult};
use crate::models::user_state::UserState;
use crate::AppState;

async fn apply<F>(state: &AppState, user_id: Uuid, op: F) -> AppResult<Applied>
where
    F: FnOnce(&Engine, UserState) -> AppResult<Applied>,
{
    let mut tx = state.db.begin().await?;

    let before = store::fetch_user_state(&mut tx, user_id, true)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    let applied = op(&state.engine, before.clone())?;
    if applied.state != before {
        store::save_snapshot(&mut tx, user_id, &before, &applied.state).await?;
    }
    tx.commit().await?;

    if applied.celebrate {
        notify_target_met(state, user_id, &applied.state);
    }
    Ok(applied)
}

fn notify_target_met(state: &AppState, user_id: Uuid, snapshot: &UserState) {
    let status = snapshot.status(Utc::now().date_naive());
    let msg = json!({
        "type": "target_met",
        "user_id": user_id,
        "total": status.total,
        "target": status.target,
        "streak": snapshot.streak,
    });
    // No subscribers is not an error
    let _ = state.ws_tx.send(msg.to_string());
    tracing::info!(user_id = %user_id, total = status.total, target = status.target, "Daily target met");
}

fn respond(applied: Applied) -> Json<ProgressResponse> {
    let status = applied.state.status(Utc::now().date_naive());
    Json(ProgressResponse {
        state: applied.state,
        status,
        celebrate: applied.celebrate,
    })
}

pub async fn manual_increment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ManualIncrementRequest>,
) -> AppResult<Json<ProgressResponse>> {
    body.validate()?;

    let applied = apply(&state, auth_user.id, |engine, snapshot| {
        Ok(engine.apply_manual_increment(snapshot, body.count, Utc::now()))
    })
    .await?;

    tracing::debug!(user_id = %auth_user.id, count = body.count, "Manual progress recorded");
    Ok(respond(applied))
}

/// Client-supplied sync payload, as produced by a browser-side fetch.
pub async fn sync(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<SyncRequest>,
) -> AppResult<Json<ProgressResponse>> {
    body.validate()?;
    body.validate_logs().map_err(AppError::Validation)?;

    let remote = body.into_remote_sync(state.engine.remote_platform());
    let applied = reconcile(&state, auth_user.id, remote).await?;
    Ok(respond(applied))
}

/// Server-side fetch from the remote stats service followed by the same
/// reconciliation as [`sync`]. Nothing is locked while the fetch runs.
pub async fn fetch_and_sync(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<FetchSyncRequest>,
) -> AppResult<Json<ProgressResponse>> {
    body.validate()?;

    let remote = state.remote.fetch(body.username.trim(), Utc::now()).await?;
    let applied = reconcile(&state, auth_user.id, remote).await?;
    Ok(respond(applied))
}

async fn reconcile(state: &AppState, user_id: Uuid, remote: RemoteSync) -> AppResult<Applied> {
    let entries = remote.logs.len();
    let applied = apply(state, user_id, |engine, snapshot| {
        Ok(engine.reconcile_remote_sync(snapshot, remote, Utc::now()))
    })
    .await?;

    tracing::info!(
        user_id = %user_id,
        entries,
        total_solved = applied.state.total_solved,
        streak = applied.state.streak,
        "Sync applied"
    );
    Ok(applied)
}

/// Accept a missed day: the shortfall is added to the daily target.
pub async fn record_miss(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<MissRequest>,
) -> AppResult<Json<ProgressResponse>> {
    body.validate()?;

    let applied = apply(&state, auth_user.id, |engine, snapshot| {
        let now = Utc::now();
        if snapshot.status(now.date_naive()).target_met {
            return Err(AppError::Conflict("Daily target already met".into()));
        }
        Ok(Applied {
            state: engine.adjust_target_for_miss(snapshot, body.deficit, body.reason, now),
            celebrate: false,
        })
    })
    .await?;

    tracing::info!(
        user_id = %auth_user.id,
        deficit = body.deficit,
        daily_target = applied.state.daily_target,
        "Missed day recorded"
    );
    Ok(respond(applied))
}

/// Return an elevated target to the baseline once today's total reaches it.
pub async fn reset_target(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<ProgressResponse>> {
    let applied = apply(&state, auth_user.id, |engine, snapshot| {
        let elevated = snapshot.daily_target > engine.baseline_target();
        if elevated && !snapshot.status(Utc::now().date_naive()).target_met {
            return Err(AppError::Conflict("Elevated target not met yet".into()));
        }
        Ok(Applied {
            state: engine.reset_target_after_catch_up(snapshot),
            celebrate: false,
        })
    })
    .await?;

    Ok(respond(applied))
}
