use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;
use uuid::Uuid;
use chrono::{NaiveDate, Utc};

use crate::engine::period::{period_index, settled_completions};
use crate::errors::AppError;
use crate::handlers::current_user_id;
use crate::models::goal::GoalWithActivity;
use crate::utils::validation::{validate_frequency, validate_payload};

#[derive(Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GoalRequest {
    pub activity_id: Uuid,

    #[validate(length(min = 1, max = 300, message = "Goal description must be between 1 and 300 characters"))]
    pub goal_description: String,

    pub frequency: i32,

    pub start_date: NaiveDate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub new_active: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManageGoalsResponse {
    goal_slots: i32,
    active_count: i64,
    goals: Vec<GoalWithActivity>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteGoalResponse {
    deleted_id: Uuid,
}

async fn fetch_goal_with_activity(
    pool: &sqlx::PgPool,
    goal_id: Uuid,
) -> Result<GoalWithActivity, AppError> {
    sqlx::query_as::<_, GoalWithActivity>(
        "SELECT g.id, g.activity_id, g.goal_description, g.frequency, g.period, g.start_date,
            g.is_active, g.completions_for_period, g.period_index, g.created_at,
            r.activity_label, r.activity_class
        FROM goals g
        JOIN activity_reference r ON r.id = g.activity_id
        WHERE g.id = $1",
    )
    .bind(goal_id)
    .fetch_optional(pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?
    .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))
}

fn settle_for_display(goal: &mut GoalWithActivity, today: NaiveDate) {
    let current = period_index(goal.start_date, today);
    goal.completions_for_period =
        settled_completions(goal.period_index, goal.completions_for_period, current);
    goal.period_index = current;
}

// GET /v1/goals
pub async fn get_goals(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user_id(&req, &pool).await?;

    let (goal_slots,): (i32,) =
        sqlx::query_as("SELECT goal_slots FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&**pool)
            .await?;

    let mut goals = sqlx::query_as::<_, GoalWithActivity>(
        "SELECT g.id, g.activity_id, g.goal_description, g.frequency, g.period, g.start_date,
            g.is_active, g.completions_for_period, g.period_index, g.created_at,
            r.activity_label, r.activity_class
        FROM goals g
        JOIN activity_reference r ON r.id = g.activity_id
        WHERE g.user_id = $1
        ORDER BY g.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&**pool)
    .await?;

    let today = Utc::now().date_naive();
    for goal in &mut goals {
        settle_for_display(goal, today);
    }
    let active_count = goals.iter().filter(|g| g.is_active).count() as i64;

    Ok(HttpResponse::Ok().json(ManageGoalsResponse {
        goal_slots,
        active_count,
        goals,
    }))
}

// POST /v1/goals
pub async fn create_goal(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    payload: web::Json<GoalRequest>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;
    validate_frequency(payload.frequency)?;

    let user_id = current_user_id(&req, &pool).await?;

    let (activity_exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM activity_reference WHERE id = $1)",
    )
    .bind(payload.activity_id)
    .fetch_one(&**pool)
    .await?;
    if !activity_exists {
        return Err(AppError::BadRequest("Unknown activity".to_string()));
    }

    // Capacity check and insert under a profile-row lock so two concurrent
    // creates cannot both pass the slot count
    let mut tx = pool.begin().await?;

    let (goal_slots,): (i32,) =
        sqlx::query_as("SELECT goal_slots FROM profiles WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

    let (active_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM goals WHERE user_id = $1 AND is_active = TRUE",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    if active_count >= goal_slots as i64 {
        return Err(AppError::CapacityExceeded(format!(
            "All {} goal slots are in use",
            goal_slots
        )));
    }

    let goal_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO goals
            (id, user_id, activity_id, goal_description, frequency, period, start_date,
             is_active, completions_for_period, period_index, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 'weekly', $6, TRUE, 0, $7, $8, $8)",
    )
    .bind(goal_id)
    .bind(user_id)
    .bind(payload.activity_id)
    .bind(&payload.goal_description)
    .bind(payload.frequency)
    .bind(payload.start_date)
    .bind(period_index(payload.start_date, now.date_naive()))
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let goal = fetch_goal_with_activity(&pool, goal_id).await?;
    Ok(HttpResponse::Created().json(goal))
}

// PATCH /v1/goals/{goalId}
pub async fn update_goal(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    goal_id: web::Path<Uuid>,
    payload: web::Json<GoalRequest>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;
    validate_frequency(payload.frequency)?;

    let user_id = current_user_id(&req, &pool).await?;

    let (activity_exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM activity_reference WHERE id = $1)",
    )
    .bind(payload.activity_id)
    .fetch_one(&**pool)
    .await?;
    if !activity_exists {
        return Err(AppError::BadRequest("Unknown activity".to_string()));
    }

    // Edits never reset completions_for_period
    let result = sqlx::query(
        "UPDATE goals SET
            activity_id = $3, goal_description = $4, frequency = $5, start_date = $6, updated_at = $7
        WHERE id = $1 AND user_id = $2",
    )
    .bind(*goal_id)
    .bind(user_id)
    .bind(payload.activity_id)
    .bind(&payload.goal_description)
    .bind(payload.frequency)
    .bind(payload.start_date)
    .bind(Utc::now())
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Goal not found".to_string()));
    }

    let goal = fetch_goal_with_activity(&pool, *goal_id).await?;
    Ok(HttpResponse::Ok().json(goal))
}

// POST /v1/goals/{goalId}/toggle
pub async fn toggle_goal_active(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    goal_id: web::Path<Uuid>,
    payload: web::Json<ToggleRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user_id(&req, &pool).await?;

    let mut tx = pool.begin().await?;

    let (goal_slots,): (i32,) =
        sqlx::query_as("SELECT goal_slots FROM profiles WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

    if payload.new_active {
        // Re-activating counts against the slot limit
        let (active_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM goals WHERE user_id = $1 AND is_active = TRUE AND id <> $2",
        )
        .bind(user_id)
        .bind(*goal_id)
        .fetch_one(&mut *tx)
        .await?;

        if active_count >= goal_slots as i64 {
            return Err(AppError::CapacityExceeded(format!(
                "All {} goal slots are in use",
                goal_slots
            )));
        }
    }

    let result = sqlx::query(
        "UPDATE goals SET is_active = $3, updated_at = $4 WHERE id = $1 AND user_id = $2",
    )
    .bind(*goal_id)
    .bind(user_id)
    .bind(payload.new_active)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Goal not found".to_string()));
    }

    tx.commit().await?;

    let goal = fetch_goal_with_activity(&pool, *goal_id).await?;
    Ok(HttpResponse::Ok().json(goal))
}

// DELETE /v1/goals/{goalId}
//
// Only inactive goals can be deleted. Historical activity rows keep their
// history: the FK nulls their goal_id instead of cascading.
pub async fn delete_goal(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    goal_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user_id(&req, &pool).await?;

    let (is_active,): (bool,) = sqlx::query_as(
        "SELECT is_active FROM goals WHERE id = $1 AND user_id = $2",
    )
    .bind(*goal_id)
    .bind(user_id)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

    if is_active {
        return Err(AppError::Conflict(
            "Deactivate the goal before deleting it".to_string(),
        ));
    }

    sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
        .bind(*goal_id)
        .bind(user_id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(DeleteGoalResponse { deleted_id: *goal_id }))
}
