//! # CodeStrike: Request/Response DTOs
//!
//! API contract types shared by the handlers.
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body
//! - `*Response` → serialized to client JSON
//! - Field rules are expressed via `validator` derive macros; rules that span
//!   several fields live in `validate_*` helpers at the bottom

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::engine::RemoteSync;
use crate::models::daily_log::{DailyLog, PlatformBreakdown};
use crate::models::goal::GoalType;
use crate::models::user_state::{TodayStatus, UserState};

/// Upper bound for any solved count a client may report.
pub const MAX_SOLVED_COUNT: i32 = 1_000_000;

// ============================================================================
// Common
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: Uuid,
}

// ============================================================================
// Auth & recovery
// ============================================================================

/// POST /api/auth/register
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"), length(max = 254, message = "Email too long"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 300, message = "Security question is required"))]
    pub security_question: String,

    #[validate(length(min = 1, max = 200, message = "Security answer is required"))]
    pub security_answer: String,
}

/// POST /api/auth/login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// POST /api/auth/refresh
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/auth/recovery/question
#[derive(Debug, Deserialize, Validate)]
pub struct SecurityQuestionRequest {
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
}

/// A missing account is an ordinary answer here, not an error.
#[derive(Debug, Serialize)]
pub struct SecurityQuestionResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

/// POST /api/auth/recovery/reset
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, message = "Answer is required"))]
    pub answer: String,

    #[validate(length(min = 8, max = 128, message = "New password must be 8-128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub reset: bool,
}

/// PUT /api/me/security
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSecurityRequest {
    #[validate(length(min = 1, max = 300))]
    pub question: String,

    #[validate(length(min = 1, max = 200))]
    pub answer: String,
}

// ============================================================================
// Progress & sync
// ============================================================================

/// POST /api/progress/manual
#[derive(Debug, Deserialize, Validate)]
pub struct ManualIncrementRequest {
    /// Zero is accepted and changes nothing
    #[validate(range(min = 0, max = 1000, message = "Count must be 0-1000"))]
    pub count: i32,
}

/// POST /api/sync: full remote log set, not a delta
#[derive(Debug, Deserialize, Validate)]
pub struct SyncRequest {
    pub logs: Vec<DailyLog>,

    #[validate(range(min = 0, max = 1_000_000, message = "total_solved must be 0-1000000"))]
    pub total_solved: i32,

    #[validate(range(min = 0, max = 1_000_000, message = "solved_today must be 0-1000000"))]
    pub solved_today: i32,
}

/// POST /api/sync/fetch
#[derive(Debug, Deserialize, Validate)]
pub struct FetchSyncRequest {
    #[validate(
        length(min = 1, max = 64, message = "Username must be 1-64 characters"),
        custom = "validate_username"
    )]
    pub username: String,
}

/// POST /api/target/miss
#[derive(Debug, Deserialize, Validate)]
pub struct MissRequest {
    #[validate(range(min = 1, max = 100, message = "Deficit must be 1-100"))]
    pub deficit: i32,

    #[validate(length(max = 1000, message = "Reason must be under 1000 characters"))]
    pub reason: Option<String>,
}

/// GET /api/state
#[derive(Debug, Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    pub state: UserState,
    pub status: TodayStatus,
}

/// Response for every state-changing progress call
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub state: UserState,
    pub status: TodayStatus,
    /// True only on the call that completed today's target
    pub celebrate: bool,
}

// ============================================================================
// Goals
// ============================================================================

/// POST /api/goals
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGoalRequest {
    pub goal_type: GoalType,

    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: String,

    #[validate(range(min = 1, message = "Target must be positive"))]
    pub target_count: i32,

    pub deadline: NaiveDate,

    /// Default: "problems"
    #[validate(length(min = 1, max = 50))]
    pub unit: Option<String>,
}

/// PUT /api/goals/{id}: partial update of user-editable fields
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGoalRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,

    #[validate(range(min = 1))]
    pub target_count: Option<i32>,

    pub deadline: Option<NaiveDate>,
}

// ============================================================================
// Validation helpers
// ============================================================================

impl SyncRequest {
    /// Counts must lie in `0..=MAX_SOLVED_COUNT` and each date may appear once.
    pub fn validate_logs(&self) -> Result<(), String> {
        let in_range = |c: i32| (0..=MAX_SOLVED_COUNT).contains(&c);
        let mut seen = HashSet::new();
        for log in &self.logs {
            if !in_range(log.solved_count) || !log.platform_breakdown.values().all(|c| in_range(*c)) {
                return Err(format!("Count out of range on {}", log.day_key()));
            }
            if !seen.insert(log.day()) {
                return Err(format!("Duplicate log for {}", log.day_key()));
            }
        }
        Ok(())
    }

    /// Every entry is the remote platform's record for its day, so its whole
    /// count is filed under `platform` whatever breakdown the client sent.
    /// Days without activity are dropped.
    pub fn into_remote_sync(self, platform: &str) -> RemoteSync {
        let logs = self
            .logs
            .into_iter()
            .filter(|log| log.solved_count > 0)
            .map(|log| DailyLog {
                platform_breakdown: PlatformBreakdown::from([(platform.to_string(), log.solved_count)]),
                ..log
            })
            .collect();
        RemoteSync {
            logs,
            total_solved: self.total_solved,
            solved_today: self.solved_today,
        }
    }
}

/// Usernames become a URL path segment on the stats host.
fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username_charset"))
    }
}

impl UpdateGoalRequest {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.target_count.is_none() && self.deadline.is_none()
    }
}
