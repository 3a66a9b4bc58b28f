use actix_web::{web, HttpResponse, HttpRequest};
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{NaiveDate, Utc};
use lazy_static::lazy_static;
use moka::sync::Cache;
use uuid::Uuid;

use crate::engine::config::EngineConfig;
use crate::engine::period::{period_index, settled_completions};
use crate::engine::visibility::can_view_full;
use crate::errors::AppError;
use crate::handlers::{current_user_id, load_settled_momentum};
use crate::models::activity::visible_location;
use crate::models::catalog::ActivityClass;
use crate::models::follow::{FollowStatus, GetFollowStatus};
use crate::models::profile::PublicEnvelope;
use crate::utils::validation::{validate_payload, validate_username};

lazy_static! {
    // Taken usernames are hot on the settings page (debounced availability
    // checks), so known-taken names are served from memory.
    pub static ref USERNAME_CACHE: Cache<String, bool> = Cache::new(10_000);
}

#[derive(Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    username: Option<String>,

    #[validate(length(min = 1, max = 60, message = "Display name must be between 1 and 60 characters"))]
    display_name: Option<String>,

    #[validate(url(message = "Invalid avatar URL"))]
    avatar_url: Option<String>,

    is_public: Option<bool>,
}

#[derive(sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsResponse {
    email: String,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    is_public: bool,
    goal_slots: i32,
}

// GET /v1/user
pub async fn get_settings(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user_id(&req, &pool).await?;

    let settings = sqlx::query_as::<_, SettingsResponse>(
        "SELECT email, username, display_name, avatar_url, is_public, goal_slots
        FROM profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?
    .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(HttpResponse::Ok().json(settings))
}

/// A submitted username counts as a rename only when it differs from the
/// caller's current one. Clients echo the unchanged name on every save, so
/// treating it as a fresh claim would lock users out of their own settings.
fn rename_target(current_username: &str, submitted: Option<&str>) -> Option<String> {
    let submitted = submitted?;
    if submitted.eq_ignore_ascii_case(current_username) {
        None
    } else {
        Some(submitted.to_string())
    }
}

/// The old name becomes claimable again the moment the rename lands.
fn record_rename(cache: &Cache<String, bool>, old_username: &str, new_username: &str) {
    cache.invalidate(&old_username.to_lowercase());
    cache.insert(new_username.to_lowercase(), true);
}

// PATCH /v1/user
pub async fn update_settings(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    updates: web::Json<SettingsUpdate>,
) -> Result<HttpResponse, AppError> {
    let updates = updates.clone();
    validate_payload(&updates)?;
    if let Some(username) = &updates.username {
        validate_username(username)?;
    }

    let user_id = current_user_id(&req, &pool).await?;

    let (current_username,): (String,) =
        sqlx::query_as("SELECT username FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&**pool)
            .await
            .map_err(|_| AppError::InternalServerError("Database error".to_string()))?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let new_username = rename_target(&current_username, updates.username.as_deref());
    if let Some(name) = &new_username {
        if USERNAME_CACHE.get(&name.to_lowercase()).is_some() {
            return Err(AppError::UsernameNotAvailable("Username is not available".to_string()));
        }
    }

    let result = sqlx::query(
        "UPDATE profiles SET
            username = COALESCE($2, username),
            display_name = COALESCE($3, display_name),
            avatar_url = COALESCE($4, avatar_url),
            is_public = COALESCE($5, is_public),
            updated_at = $6
        WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(&new_username)
    .bind(&updates.display_name)
    .bind(&updates.avatar_url)
    .bind(updates.is_public)
    .bind(Utc::now())
    .execute(&**pool)
    .await;

    if let Err(e) = result {
        if let Some(db_err) = e.as_database_error() {
            // Uniqueness race lost: surfaced distinctly so the client can
            // re-prompt just the username field
            if db_err.constraint() == Some("profiles_username_key") {
                return Err(AppError::UsernameNotAvailable("Username is not available".to_string()));
            }
        }
        return Err(AppError::InternalServerError("Database error".to_string()));
    }

    if let Some(name) = &new_username {
        record_rename(&USERNAME_CACHE, &current_username, name);
    }

    let settings = sqlx::query_as::<_, SettingsResponse>(
        "SELECT email, username, display_name, avatar_url, is_public, goal_slots
        FROM profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?;

    Ok(HttpResponse::Ok().json(settings))
}

#[derive(Deserialize)]
pub struct UsernameCheckQuery {
    candidate: String,
}

#[derive(Serialize)]
struct UsernameCheckResponse {
    available: bool,
}

// GET /v1/username/check?candidate=
pub async fn check_username_availability(
    pool: web::Data<sqlx::PgPool>,
    query: web::Query<UsernameCheckQuery>,
) -> Result<HttpResponse, AppError> {
    let candidate = query.candidate.trim();
    if validate_username(candidate).is_err() {
        return Ok(HttpResponse::Ok().json(UsernameCheckResponse { available: false }));
    }

    let key = candidate.to_lowercase();
    if USERNAME_CACHE.get(&key).is_some() {
        return Ok(HttpResponse::Ok().json(UsernameCheckResponse { available: false }));
    }

    let (taken,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM profiles WHERE LOWER(username) = $1)",
    )
    .bind(&key)
    .fetch_one(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?;

    if taken {
        USERNAME_CACHE.insert(key, true);
    }

    Ok(HttpResponse::Ok().json(UsernameCheckResponse { available: !taken }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    term: String,
}

/// `%`, `_` and the escape character itself are literals in a search term,
/// not LIKE wildcards.
fn search_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// GET /v1/users/search?term=
pub async fn search_users(
    pool: web::Data<sqlx::PgPool>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let term = query.term.trim();
    if term.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<PublicEnvelope>::new()));
    }

    let pattern = search_pattern(term);
    let users = sqlx::query_as::<_, PublicEnvelope>(
        "SELECT user_id, username, display_name, avatar_url, is_public
        FROM profiles
        WHERE username ILIKE $1 ESCAPE '\\' OR display_name ILIKE $1 ESCAPE '\\'
        ORDER BY username
        LIMIT 25",
    )
    .bind(&pattern)
    .fetch_all(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?;

    Ok(HttpResponse::Ok().json(users))
}

#[derive(Deserialize)]
pub struct LatestUsersQuery {
    limit: Option<i64>,
}

// GET /v1/users/latest?limit=
pub async fn get_latest_users(
    pool: web::Data<sqlx::PgPool>,
    query: web::Query<LatestUsersQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 50);

    let users = sqlx::query_as::<_, PublicEnvelope>(
        "SELECT user_id, username, display_name, avatar_url, is_public
        FROM profiles
        ORDER BY created_at DESC
        LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?;

    Ok(HttpResponse::Ok().json(users))
}

#[derive(sqlx::FromRow)]
struct ProfileHeader {
    user_id: Uuid,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    is_public: bool,
}

#[derive(sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActiveGoalView {
    id: Uuid,
    activity_label: String,
    activity_class: ActivityClass,
    goal_description: String,
    frequency: i32,
    period: String,
    start_date: NaiveDate,
    completions_for_period: i32,
    period_index: i32,
    created_at: chrono::DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityLogView {
    id: Uuid,
    activity_label: String,
    activity_class: ActivityClass,
    timestamp: chrono::DateTime<Utc>,
    location_tag: Option<String>,
    #[serde(skip)]
    location_is_hidden: bool,
    details_value: Option<String>,
    details_units: Option<String>,
    energy_gained: i32,
}

/// The full ProfilePage payload. Gated fields are omitted, not blanked: field
/// presence is how the client detects its access level.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEnvelope {
    id: Uuid,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    is_public: bool,
    follower_count: i64,
    following_count: i64,
    total_activities: i64,
    mutual_followers_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewer_follow_status: Option<FollowStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_follow_status: Option<FollowStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    energy: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    energy_for_next_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    momentum: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lifetime_energy: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lifetime_momentum: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_goals: Option<Vec<ActiveGoalView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    activity_log: Option<Vec<ActivityLogView>>,
}

async fn follow_status_between(
    pool: &sqlx::PgPool,
    follower: Uuid,
    followed: Uuid,
) -> Result<Option<FollowStatus>, AppError> {
    let row = sqlx::query_as::<_, GetFollowStatus>(
        "SELECT status FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(follower)
    .bind(followed)
    .fetch_optional(pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?;
    Ok(row.map(|r| r.status))
}

// GET /v1/profiles/{username}
pub async fn get_profile_by_username(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    config: web::Data<EngineConfig>,
    username: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let viewer_id = current_user_id(&req, &pool).await?;

    let target = sqlx::query_as::<_, ProfileHeader>(
        "SELECT user_id, username, display_name, avatar_url, is_public
        FROM profiles WHERE LOWER(username) = LOWER($1)",
    )
    .bind(username.as_str())
    .fetch_optional(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?
    .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let is_owner = viewer_id == target.user_id;

    let (follower_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM follows WHERE followed_id = $1 AND status = 'accepted'",
    )
    .bind(target.user_id)
    .fetch_one(&**pool)
    .await?;

    let (following_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND status = 'accepted'",
    )
    .bind(target.user_id)
    .fetch_one(&**pool)
    .await?;

    let (total_activities,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activities WHERE user_id = $1",
    )
    .bind(target.user_id)
    .fetch_one(&**pool)
    .await?;

    let (viewer_follow_status, target_follow_status, mutual_followers_count) = if is_owner {
        (None, None, 0)
    } else {
        let viewer_status = follow_status_between(&pool, viewer_id, target.user_id).await?;
        let target_status = follow_status_between(&pool, target.user_id, viewer_id).await?;
        // Accepted followings of the viewer that are accepted followers of the target
        let (mutuals,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM follows mine
            JOIN follows theirs ON theirs.follower_id = mine.followed_id
            WHERE mine.follower_id = $1 AND mine.status = 'accepted'
              AND theirs.followed_id = $2 AND theirs.status = 'accepted'",
        )
        .bind(viewer_id)
        .bind(target.user_id)
        .fetch_one(&**pool)
        .await?;
        (viewer_status, target_status, mutuals)
    };

    let mut envelope = ProfileEnvelope {
        id: target.user_id,
        username: target.username,
        display_name: target.display_name,
        avatar_url: target.avatar_url,
        is_public: target.is_public,
        follower_count,
        following_count,
        total_activities,
        mutual_followers_count,
        viewer_follow_status,
        target_follow_status,
        energy: None,
        energy_for_next_level: None,
        momentum: None,
        lifetime_energy: None,
        lifetime_momentum: None,
        active_goals: None,
        activity_log: None,
    };

    if !can_view_full(is_owner, target.is_public, viewer_follow_status) {
        return Ok(HttpResponse::Ok().json(envelope));
    }

    let now = Utc::now();
    let state = load_settled_momentum(&pool, &config, target.user_id, now).await?;
    envelope.energy = Some(state.current_energy);
    envelope.energy_for_next_level = Some(config.energy_for_next_level(state.current_momentum));
    envelope.momentum = Some(state.current_momentum);
    envelope.lifetime_energy = Some(state.lifetime_energy);
    envelope.lifetime_momentum = Some(state.lifetime_momentum);

    let mut active_goals = sqlx::query_as::<_, ActiveGoalView>(
        "SELECT g.id, r.activity_label, r.activity_class, g.goal_description, g.frequency,
            g.period, g.start_date, g.completions_for_period, g.period_index, g.created_at
        FROM goals g
        JOIN activity_reference r ON r.id = g.activity_id
        WHERE g.user_id = $1 AND g.is_active = TRUE
        ORDER BY g.created_at",
    )
    .bind(target.user_id)
    .fetch_all(&**pool)
    .await?;

    // Counters settle lazily: a goal last written in an earlier week shows 0
    let today = now.date_naive();
    for goal in &mut active_goals {
        let current = period_index(goal.start_date, today);
        goal.completions_for_period =
            settled_completions(goal.period_index, goal.completions_for_period, current);
        goal.period_index = current;
    }
    envelope.active_goals = Some(active_goals);

    let mut activity_log = sqlx::query_as::<_, ActivityLogView>(
        "SELECT a.id, r.activity_label, r.activity_class, a.timestamp, a.location_tag,
            a.location_is_hidden, a.details_value, a.details_units, a.energy_gained
        FROM activities a
        JOIN activity_reference r ON r.id = a.activity_id
        WHERE a.user_id = $1
        ORDER BY a.timestamp DESC
        LIMIT 5",
    )
    .bind(target.user_id)
    .fetch_all(&**pool)
    .await?;

    for entry in &mut activity_log {
        entry.location_tag =
            visible_location(entry.location_tag.take(), entry.location_is_hidden, is_owner);
    }
    envelope.activity_log = Some(activity_log);

    Ok(HttpResponse::Ok().json(envelope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echoing_the_current_username_is_not_a_rename() {
        assert_eq!(rename_target("alice", Some("alice")), None);
        assert_eq!(rename_target("alice", Some("ALICE")), None);
        assert_eq!(rename_target("alice", None), None);
    }

    #[test]
    fn a_different_username_is_a_rename() {
        assert_eq!(rename_target("alice", Some("alice_2")), Some("alice_2".to_string()));
    }

    #[test]
    fn rename_frees_the_old_name_and_claims_the_new_one() {
        let cache: Cache<String, bool> = Cache::new(16);
        cache.insert("alice".to_string(), true);

        record_rename(&cache, "Alice", "Alice_2");

        assert!(cache.get("alice").is_none());
        assert!(cache.get("alice_2").is_some());
    }

    #[test]
    fn search_pattern_escapes_like_wildcards() {
        assert_eq!(search_pattern("al_ce"), "%al\\_ce%");
        assert_eq!(search_pattern("100%"), "%100\\%%");
        assert_eq!(search_pattern(r"back\slash"), "%back\\\\slash%");
        assert_eq!(search_pattern("plain"), "%plain%");
    }
}
