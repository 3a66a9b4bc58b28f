use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

/// One row per profile, created alongside it at registration.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct MomentumState {
    pub user_id: Uuid,
    pub current_energy: i32,
    pub current_momentum: i32,
    pub lifetime_energy: i64,
    pub lifetime_momentum: i32,
    pub shield_expires_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}
