use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{NaiveDate, Utc};

use super::catalog::ActivityClass;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_id: Uuid,
    pub goal_description: String,
    /// Target completions per period, always > 0.
    pub frequency: i32,
    pub period: String,
    pub start_date: NaiveDate,
    pub is_active: bool,
    pub completions_for_period: i32,
    /// Index of the weekly period the counter above was last written in.
    pub period_index: i32,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// Goal row joined with its catalog entry, as the manage-goals page consumes it.
#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GoalWithActivity {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub goal_description: String,
    pub frequency: i32,
    pub period: String,
    pub start_date: NaiveDate,
    pub is_active: bool,
    pub completions_for_period: i32,
    pub period_index: i32,
    pub created_at: chrono::DateTime<Utc>,
    pub activity_label: String,
    pub activity_class: ActivityClass,
}
