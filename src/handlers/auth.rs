use axum::{extract::State, Extension, Json};
use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    jwt::{create_token_pair, hash_token, verify_token, TokenPair, TokenType},
    middleware::AuthUser,
    password::{hash_password, hash_security_answer, verify_password, verify_security_answer},
};
use crate::db::store;
use crate::dto::{
    DeleteResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, ResetPasswordResponse, SecurityQuestionRequest,
    SecurityQuestionResponse, UpdateSecurityRequest,
};
use crate::error::{AppError, AppResult};
use crate::models::user::{User, UserProfile};
use crate::AppState;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn find_user_by_email(db: &sqlx::PgPool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(normalize_email(email))
        .fetch_optional(db)
        .await?;
    Ok(user)
}

async fn store_refresh_token(
    db: &sqlx::PgPool,
    user_id: Uuid,
    raw_refresh_token: &str,
    ttl_secs: i64,
    parent_token_id: Option<Uuid>,
) -> AppResult<Uuid> {
    let token_hash = hash_token(raw_refresh_token);
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, parent_token_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .bind(parent_token_id)
    .execute(db)
    .await?;

    Ok(id)
}

/// Create a token pair AND persist the refresh token hash in the DB.
async fn issue_token_pair(
    db: &sqlx::PgPool,
    user_id: Uuid,
    email: &str,
    config: &crate::config::Config,
    parent_token_id: Option<Uuid>,
) -> AppResult<TokenPair> {
    let tokens = create_token_pair(user_id, email, config)?;
    store_refresh_token(
        db,
        user_id,
        &tokens.refresh_token,
        config.jwt_refresh_ttl_secs,
        parent_token_id,
    )
    .await?;
    Ok(tokens)
}

/// Revoke all active refresh tokens for a user.
async fn revoke_all_user_tokens(db: &sqlx::PgPool, user_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true, revoked_at = NOW()
        WHERE user_id = $1 AND revoked = false
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

/// Creates the account together with its empty profile so that every user
/// always has state to reconcile against.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<TokenPair>> {
    body.validate()?;
    let email = normalize_email(&body.email);

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;

    if existing > 0 {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let pwd_hash = hash_password(&body.password)?;
    let answer_hash = hash_security_answer(&body.security_answer)?;

    let user_id = Uuid::new_v4();
    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, security_question, security_answer_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&pwd_hash)
    .bind(body.name.trim())
    .bind(body.security_question.trim())
    .bind(&answer_hash)
    .execute(&mut *tx)
    .await?;

    store::create_profile(&mut tx, user_id, state.engine.baseline_target()).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, "User registered");
    let tokens = issue_token_pair(&state.db, user_id, &email, &state.config, None).await?;
    Ok(Json(tokens))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    body.validate()?;

    let user = find_user_by_email(&state.db, &body.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let tokens = issue_token_pair(&state.db, user.id, &user.email, &state.config, None).await?;
    Ok(Json(tokens))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let token_data = verify_token(&body.refresh_token, &state.config)?;

    if token_data.claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized);
    }

    let token_hash = hash_token(&body.refresh_token);

    let stored = sqlx::query_as::<_, (Uuid, Uuid, bool)>(
        r#"
        SELECT id, user_id, revoked
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let (stored_id, stored_user_id, revoked) = stored;

    // A revoked token showing up again means the family leaked
    if revoked {
        tracing::warn!(
            user_id = %stored_user_id,
            token_id = %stored_id,
            "Refresh token reuse detected, revoking all tokens for user"
        );
        revoke_all_user_tokens(&state.db, stored_user_id).await?;
        return Err(AppError::Unauthorized);
    }

    if stored_user_id != token_data.claims.sub {
        return Err(AppError::Unauthorized);
    }

    // Single-use rotation
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true, revoked_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(stored_id)
    .execute(&state.db)
    .await?;

    let tokens = issue_token_pair(
        &state.db,
        token_data.claims.sub,
        &token_data.claims.email,
        &state.config,
        Some(stored_id),
    )
    .await?;
    Ok(Json(tokens))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<MessageResponse>> {
    revoke_all_user_tokens(&state.db, auth_user.id).await?;
    tracing::info!(user_id = %auth_user.id, email = %auth_user.email, "User logged out");
    Ok(Json(MessageResponse {
        message: "Logged out successfully".into(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UserProfile>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(auth_user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("User not found".into()))?;

    Ok(Json(user.into()))
}

/// Step one of recovery. Unknown emails and accounts without a question
/// both answer `found: false`.
pub async fn security_question(
    State(state): State<AppState>,
    Json(body): Json<SecurityQuestionRequest>,
) -> AppResult<Json<SecurityQuestionResponse>> {
    body.validate()?;

    let question = find_user_by_email(&state.db, &body.email)
        .await?
        .filter(|u| u.security_answer_hash.is_some())
        .and_then(|u| u.security_question);

    Ok(Json(SecurityQuestionResponse {
        found: question.is_some(),
        question,
    }))
}

/// Step two of recovery. A wrong answer is `reset: false`, never an error,
/// so the response does not reveal which part failed.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<ResetPasswordResponse>> {
    body.validate()?;

    let Some(user) = find_user_by_email(&state.db, &body.email).await? else {
        return Ok(Json(ResetPasswordResponse { reset: false }));
    };
    let Some(answer_hash) = user.security_answer_hash.as_deref() else {
        return Ok(Json(ResetPasswordResponse { reset: false }));
    };

    if !verify_security_answer(&body.answer, answer_hash)? {
        tracing::warn!(user_id = %user.id, "Security answer mismatch during recovery");
        return Ok(Json(ResetPasswordResponse { reset: false }));
    }

    let pwd_hash = hash_password(&body.new_password)?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .bind(&pwd_hash)
        .execute(&state.db)
        .await?;

    // Existing sessions end with the old password
    revoke_all_user_tokens(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, "Password reset via security question");
    Ok(Json(ResetPasswordResponse { reset: true }))
}

pub async fn update_security(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateSecurityRequest>,
) -> AppResult<Json<MessageResponse>> {
    body.validate()?;

    let answer_hash = hash_security_answer(&body.answer)?;
    let updated = sqlx::query(
        r#"
        UPDATE users
        SET security_question = $2, security_answer_hash = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(auth_user.id)
    .bind(body.question.trim())
    .bind(&answer_hash)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }

    Ok(Json(MessageResponse {
        message: "Security question updated".into(),
    }))
}

/// Removes the account. Profile, goals, logs and tokens go with it via
/// cascading foreign keys.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }

    tracing::info!(user_id = %auth_user.id, "Account deleted");
    Ok(Json(DeleteResponse {
        deleted: true,
        id: auth_user.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
