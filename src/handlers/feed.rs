use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

use crate::engine::config::EngineConfig;
use crate::engine::momentum::settle_decay;
use crate::engine::visibility::can_view_full;
use crate::errors::AppError;
use crate::handlers::current_user_id;
use crate::models::activity::visible_location;
use crate::models::catalog::ActivityClass;
use crate::models::follow::GetFollowStatus;
use crate::models::momentum::MomentumState;

#[derive(Deserialize)]
pub struct FeedQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct FeedRow {
    id: Uuid,
    user_id: Uuid,
    timestamp: chrono::DateTime<Utc>,
    location_tag: Option<String>,
    location_is_hidden: bool,
    details_value: Option<String>,
    details_units: Option<String>,
    proof_url: Option<String>,
    energy_gained: i32,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    activity_label: String,
    activity_class: ActivityClass,
    goal_description: Option<String>,
    current_energy: i32,
    current_momentum: i32,
    lifetime_energy: i64,
    lifetime_momentum: i32,
    shield_expires_at: chrono::DateTime<Utc>,
    momentum_updated_at: chrono::DateTime<Utc>,
    max_frequency: i32,
    bump_count: i64,
    viewer_has_bumped: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedItem {
    id: Uuid,
    user_id: Uuid,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    activity_label: String,
    activity_class: ActivityClass,
    goal_description: Option<String>,
    timestamp: chrono::DateTime<Utc>,
    location_tag: Option<String>,
    details_value: Option<String>,
    details_units: Option<String>,
    proof_url: Option<String>,
    /// Frozen at log time.
    energy_gained: i32,
    /// Logger's momentum snapshot at read time.
    current_energy: i32,
    current_momentum: i32,
    energy_for_next_level: i32,
    bump_count: i64,
    viewer_has_bumped: bool,
}

// GET /v1/feed?limit=&offset=
//
// Activities from the viewer and their accepted followings, newest first.
// A page shorter than `limit` signals the last page.
pub async fn get_home_feed(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    config: web::Data<EngineConfig>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse, AppError> {
    let viewer_id = current_user_id(&req, &pool).await?;
    let limit = query.limit.unwrap_or(20).clamp(1, 50);
    let offset = query.offset.unwrap_or(0).max(0);

    let rows = sqlx::query_as::<_, FeedRow>(
        "SELECT a.id, a.user_id, a.timestamp, a.location_tag, a.location_is_hidden,
            a.details_value, a.details_units, a.proof_url, a.energy_gained,
            p.username, p.display_name, p.avatar_url,
            r.activity_label, r.activity_class,
            g.goal_description,
            m.current_energy, m.current_momentum, m.lifetime_energy, m.lifetime_momentum,
            m.shield_expires_at, m.updated_at AS momentum_updated_at,
            (SELECT COALESCE(MAX(g2.frequency), 0) FROM goals g2
             WHERE g2.user_id = a.user_id AND g2.is_active = TRUE) AS max_frequency,
            (SELECT COUNT(*) FROM bumps b WHERE b.activity_id = a.id) AS bump_count,
            EXISTS(SELECT 1 FROM bumps b WHERE b.activity_id = a.id AND b.bumper_id = $1)
                AS viewer_has_bumped
        FROM activities a
        JOIN profiles p ON p.user_id = a.user_id
        JOIN activity_reference r ON r.id = a.activity_id
        JOIN momentum_state m ON m.user_id = a.user_id
        LEFT JOIN goals g ON g.id = a.goal_id
        WHERE a.user_id = $1
           OR a.user_id IN (SELECT followed_id FROM follows
                            WHERE follower_id = $1 AND status = 'accepted')
        ORDER BY a.timestamp DESC
        LIMIT $2 OFFSET $3",
    )
    .bind(viewer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&**pool)
    .await?;

    let now = Utc::now();
    let items: Vec<FeedItem> = rows
        .into_iter()
        .map(|row| {
            // Display snapshot settles overdue decay in memory only; the
            // owner's own reads persist it
            let mut snapshot = MomentumState {
                user_id: row.user_id,
                current_energy: row.current_energy,
                current_momentum: row.current_momentum,
                lifetime_energy: row.lifetime_energy,
                lifetime_momentum: row.lifetime_momentum,
                shield_expires_at: row.shield_expires_at,
                updated_at: row.momentum_updated_at,
            };
            let duration = config.shield_duration(row.max_frequency);
            settle_decay(&mut snapshot, &config, duration, now);

            let viewer_is_owner = row.user_id == viewer_id;
            FeedItem {
                id: row.id,
                user_id: row.user_id,
                username: row.username,
                display_name: row.display_name,
                avatar_url: row.avatar_url,
                activity_label: row.activity_label,
                activity_class: row.activity_class,
                goal_description: row.goal_description,
                timestamp: row.timestamp,
                location_tag: visible_location(
                    row.location_tag,
                    row.location_is_hidden,
                    viewer_is_owner,
                ),
                details_value: row.details_value,
                details_units: row.details_units,
                proof_url: row.proof_url,
                energy_gained: row.energy_gained,
                current_energy: snapshot.current_energy,
                current_momentum: snapshot.current_momentum,
                energy_for_next_level: config.energy_for_next_level(snapshot.current_momentum),
                bump_count: row.bump_count,
                viewer_has_bumped: row.viewer_has_bumped,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(items))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BumpResponse {
    activity_id: Uuid,
    bump_count: i64,
    viewer_has_bumped: bool,
}

#[derive(sqlx::FromRow)]
struct ActivityOwner {
    user_id: Uuid,
    is_public: bool,
}

async fn check_bump_access(
    pool: &sqlx::PgPool,
    activity_id: Uuid,
    bumper_id: Uuid,
) -> Result<(), AppError> {
    let owner = sqlx::query_as::<_, ActivityOwner>(
        "SELECT p.user_id, p.is_public
        FROM activities a JOIN profiles p ON p.user_id = a.user_id
        WHERE a.id = $1",
    )
    .bind(activity_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))?;

    let viewer_is_owner = owner.user_id == bumper_id;
    let follow = sqlx::query_as::<_, GetFollowStatus>(
        "SELECT status FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(bumper_id)
    .bind(owner.user_id)
    .fetch_optional(pool)
    .await?
    .map(|r| r.status);

    if !can_view_full(viewer_is_owner, owner.is_public, follow) {
        return Err(AppError::Forbidden("You cannot bump this activity".to_string()));
    }
    Ok(())
}

async fn bump_count(pool: &sqlx::PgPool, activity_id: Uuid) -> Result<i64, AppError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM bumps WHERE activity_id = $1")
            .bind(activity_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

// POST /v1/activity/{activityId}/bump
pub async fn add_bump(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    activity_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let bumper_id = current_user_id(&req, &pool).await?;
    let activity_id = *activity_id;

    check_bump_access(&pool, activity_id, bumper_id).await?;

    let result = sqlx::query(
        "INSERT INTO bumps (activity_id, bumper_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (activity_id, bumper_id) DO NOTHING",
    )
    .bind(activity_id)
    .bind(bumper_id)
    .bind(Utc::now())
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Already bumped".to_string()));
    }

    Ok(HttpResponse::Created().json(BumpResponse {
        activity_id,
        bump_count: bump_count(&pool, activity_id).await?,
        viewer_has_bumped: true,
    }))
}

// DELETE /v1/activity/{activityId}/bump
pub async fn remove_bump(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    activity_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let bumper_id = current_user_id(&req, &pool).await?;
    let activity_id = *activity_id;

    let result = sqlx::query(
        "DELETE FROM bumps WHERE activity_id = $1 AND bumper_id = $2",
    )
    .bind(activity_id)
    .bind(bumper_id)
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Not bumped".to_string()));
    }

    Ok(HttpResponse::Ok().json(BumpResponse {
        activity_id,
        bump_count: bump_count(&pool, activity_id).await?,
        viewer_has_bumped: false,
    }))
}
