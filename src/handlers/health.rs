use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "codestrike-api",
        "version": env!("CARGO_PKG_VERSION"),
        "remote_platform": state.engine.remote_platform(),
        "baseline_target": state.engine.baseline_target(),
    }))
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let (code, status, database) = if db_ok {
        (StatusCode::OK, "ready", "ok")
    } else {
        tracing::warn!("Readiness check failed: database unreachable");
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready", "failed")
    };

    (
        code,
        Json(json!({
            "status": status,
            "checks": { "database": database },
        })),
    )
}
