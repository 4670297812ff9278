use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub goal_type: GoalType,
    pub description: String,
    pub target_count: i32,
    pub progress: i32,
    pub deadline: NaiveDate,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "goal_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalType {
    ShortTerm,
    LongTerm,
    Other,
}

impl GoalType {
    /// Whether progress follows the lifetime solved count.
    pub fn tracks_total(self) -> bool {
        matches!(self, Self::ShortTerm | Self::LongTerm)
    }
}

impl Default for GoalType {
    fn default() -> Self {
        Self::ShortTerm
    }
}
