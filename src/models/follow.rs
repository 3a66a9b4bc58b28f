use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

/// Maps onto the `follow_status` enum type in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "follow_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Pending,
    Accepted,
}

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub status: FollowStatus,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub struct GetFollowStatus {
    pub status: FollowStatus,
}
