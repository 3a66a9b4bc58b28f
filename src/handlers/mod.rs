pub mod activity;
pub mod auth;
pub mod catalog;
pub mod feed;
pub mod goals;
pub mod profile;
pub mod social;

use actix_web::{HttpMessage, HttpRequest};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::config::EngineConfig;
use crate::engine::momentum::settle_decay;
use crate::errors::AppError;
use crate::models::momentum::MomentumState;
use crate::models::profile::GetProfileId;
use crate::utils::jwt::Claims;

/// Resolves the authenticated caller (claims stashed by the bearer
/// middleware) to their profile id.
pub async fn current_user_id(req: &HttpRequest, pool: &PgPool) -> Result<Uuid, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let profile = sqlx::query_as::<_, GetProfileId>("SELECT user_id FROM profiles WHERE email = $1")
        .bind(&claims.sub)
        .fetch_optional(pool)
        .await
        .map_err(|_| AppError::InternalServerError("Database error".to_string()))?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(profile.user_id)
}

/// Loads a profile's momentum state and lazily applies any overdue decay,
/// persisting only when something changed. Reads and writes of momentum go
/// through here so the settle step is never skipped.
pub async fn load_settled_momentum(
    pool: &PgPool,
    config: &EngineConfig,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<MomentumState, AppError> {
    let mut tx = pool.begin().await?;

    let mut state = sqlx::query_as::<_, MomentumState>(
        "SELECT user_id, current_energy, current_momentum, lifetime_energy, lifetime_momentum, shield_expires_at, updated_at
        FROM momentum_state WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Momentum state not found".to_string()))?;

    let (max_frequency,): (i32,) = sqlx::query_as(
        "SELECT COALESCE(MAX(frequency), 0) FROM goals WHERE user_id = $1 AND is_active = TRUE",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let duration = config.shield_duration(max_frequency);
    if settle_decay(&mut state, config, duration, now) {
        state.updated_at = now;
        sqlx::query(
            "UPDATE momentum_state
            SET current_momentum = $2, shield_expires_at = $3, updated_at = $4
            WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(state.current_momentum)
        .bind(state.shield_expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(state)
}
