use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use log::debug;

use crate::engine::config::EngineConfig;
use crate::engine::momentum::{
    absorb_energy, energy_for_completion, is_in_danger, reset_shield, settle_decay,
};
use crate::engine::period::{period_index, settled_completions};
use crate::errors::AppError;
use crate::handlers::{current_user_id, load_settled_momentum};
use crate::models::catalog::ActivityReference;
use crate::models::goal::Goal;
use crate::models::momentum::MomentumState;
use crate::utils::validation::{validate_payload, validate_url};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogActivityRequest {
    pub goal_id: Option<Uuid>,

    pub activity_id: Uuid,

    /// RFC 3339 instant; must not be in the future.
    #[validate(length(min = 1, message = "Timestamp cannot be empty"))]
    pub timestamp: String,

    pub location_tag: Option<String>,

    #[serde(default)]
    pub location_is_hidden: bool,

    pub details_value: Option<String>,

    pub details_units: Option<String>,

    pub proof_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogActivityResponse {
    pub energy_gained: i32,
    pub leveled_up: bool,
}

// POST /v1/activity
//
// The single mutation point of the whole engine: the activity insert, the
// goal counter bump and the momentum update commit or roll back together.
pub async fn log_activity(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    config: web::Data<EngineConfig>,
    payload: web::Json<LogActivityRequest>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;
    if let Some(proof_url) = &payload.proof_url {
        validate_url(proof_url)?;
    }

    let timestamp = DateTime::parse_from_rfc3339(&payload.timestamp)
        .map_err(|_| AppError::BadRequest("Invalid date format".to_string()))?
        .with_timezone(&Utc);

    let now = Utc::now();
    if timestamp > now {
        return Err(AppError::BadRequest("Timestamp cannot be in the future".to_string()));
    }

    let user_id = current_user_id(&req, &pool).await?;

    let reference = sqlx::query_as::<_, ActivityReference>(
        "SELECT id, activity_class, activity_label, allowed_units
        FROM activity_reference WHERE id = $1",
    )
    .bind(payload.activity_id)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::BadRequest("Unknown activity".to_string()))?;

    if !reference.unit_allowed(payload.details_units.as_deref()) {
        return Err(AppError::BadRequest(format!(
            "Units must be one of: {}",
            reference.allowed_units.join(", ")
        )));
    }

    let mut tx = pool.begin().await?;

    // Momentum row lock serializes concurrent logs for the same profile
    let mut state = sqlx::query_as::<_, MomentumState>(
        "SELECT user_id, current_energy, current_momentum, lifetime_energy, lifetime_momentum, shield_expires_at, updated_at
        FROM momentum_state WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Momentum state not found".to_string()))?;

    // Nth in-period completion of the linked goal drives the multiplier
    let (nth_completion, goal) = match payload.goal_id {
        Some(goal_id) => {
            let goal = sqlx::query_as::<_, Goal>(
                "SELECT * FROM goals WHERE id = $1 AND user_id = $2 FOR UPDATE",
            )
            .bind(goal_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

            if !goal.is_active {
                return Err(AppError::BadRequest("Goal is not active".to_string()));
            }

            let current_period = period_index(goal.start_date, now.date_naive());
            let completions =
                settled_completions(goal.period_index, goal.completions_for_period, current_period);
            (completions + 1, Some((goal, current_period)))
        }
        None => (1, None),
    };

    let energy_gained = match &goal {
        Some(_) => energy_for_completion(&config, nth_completion),
        None => config.base_energy,
    };

    let (max_frequency,): (i32,) = sqlx::query_as(
        "SELECT COALESCE(MAX(frequency), 0) FROM goals WHERE user_id = $1 AND is_active = TRUE",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    let shield_duration = config.shield_duration(max_frequency);

    // Any decay owed from before this log still applies first
    settle_decay(&mut state, &config, shield_duration, now);
    let leveled_up = absorb_energy(&mut state, &config, energy_gained);
    reset_shield(&mut state, shield_duration, now);

    let activity_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO activities
            (id, user_id, goal_id, activity_id, timestamp, location_tag, location_is_hidden,
             details_value, details_units, proof_url, energy_gained, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(activity_id)
    .bind(user_id)
    .bind(payload.goal_id)
    .bind(payload.activity_id)
    .bind(timestamp)
    .bind(&payload.location_tag)
    .bind(payload.location_is_hidden)
    .bind(&payload.details_value)
    .bind(&payload.details_units)
    .bind(&payload.proof_url)
    .bind(energy_gained)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if let Some((goal, current_period)) = &goal {
        sqlx::query(
            "UPDATE goals SET completions_for_period = $2, period_index = $3, updated_at = $4
            WHERE id = $1",
        )
        .bind(goal.id)
        .bind(nth_completion)
        .bind(*current_period)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "UPDATE momentum_state SET
            current_energy = $2, current_momentum = $3, lifetime_energy = $4,
            lifetime_momentum = $5, shield_expires_at = $6, updated_at = $7
        WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(state.current_energy)
    .bind(state.current_momentum)
    .bind(state.lifetime_energy)
    .bind(state.lifetime_momentum)
    .bind(state.shield_expires_at)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!(
        "activity {} logged for {}: +{} energy, leveled_up={}",
        activity_id, user_id, energy_gained, leveled_up
    );

    Ok(HttpResponse::Created().json(LogActivityResponse {
        energy_gained,
        leveled_up,
    }))
}

#[derive(sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeeklyGoalProgress {
    goal_id: Uuid,
    activity_label: String,
    #[serde(rename = "completionsThisWeek")]
    completions_for_period: i32,
    #[serde(skip)]
    period_index: i32,
    #[serde(skip)]
    start_date: chrono::NaiveDate,
    #[serde(rename = "targetFrequency")]
    frequency: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusHeaderResponse {
    is_in_danger: bool,
    current_energy: i32,
    energy_for_next_level: i32,
    current_momentum: i32,
    expires_at: DateTime<Utc>,
    /// Shield window length in seconds.
    timer_duration: i64,
    weekly_goals_progress: Vec<WeeklyGoalProgress>,
}

// GET /v1/status
pub async fn get_user_status_header(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    config: web::Data<EngineConfig>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user_id(&req, &pool).await?;
    let now = Utc::now();

    let state = load_settled_momentum(&pool, &config, user_id, now).await?;

    let mut progress = sqlx::query_as::<_, WeeklyGoalProgress>(
        "SELECT g.id AS goal_id, r.activity_label, g.completions_for_period, g.period_index,
            g.start_date, g.frequency
        FROM goals g
        JOIN activity_reference r ON r.id = g.activity_id
        WHERE g.user_id = $1 AND g.is_active = TRUE
        ORDER BY g.created_at",
    )
    .bind(user_id)
    .fetch_all(&**pool)
    .await?;

    let today = now.date_naive();
    let mut max_frequency = 0;
    for goal in &mut progress {
        let current = period_index(goal.start_date, today);
        goal.completions_for_period =
            settled_completions(goal.period_index, goal.completions_for_period, current);
        max_frequency = max_frequency.max(goal.frequency);
    }
    let timer_duration = config.shield_duration(max_frequency).num_seconds();

    Ok(HttpResponse::Ok().json(StatusHeaderResponse {
        is_in_danger: is_in_danger(&state, now),
        current_energy: state.current_energy,
        energy_for_next_level: config.energy_for_next_level(state.current_momentum),
        current_momentum: state.current_momentum,
        expires_at: state.shield_expires_at,
        timer_duration,
        weekly_goals_progress: progress,
    }))
}
