use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use chrono::Utc;
use bcrypt::{hash, verify};
use validator::Validate;
use actix_web::rt::task::spawn_blocking;

use crate::engine::config::EngineConfig;
use crate::errors::AppError;
use crate::handlers::profile::USERNAME_CACHE;
use crate::models::profile::GetProfileCredentials;
use crate::utils::jwt::generate_token;
use crate::utils::validation::validate_username;

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    email: String,

    #[validate(length(min = 8, max = 32, message = "Password must be between 8 and 32 characters"))]
    password: String,

    username: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    email: String,

    #[validate(length(min = 8, max = 32, message = "Password must be between 8 and 32 characters"))]
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    email: String,
    username: String,
    token: String,
}

// POST /v1/login
pub async fn login(
    req: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    // Validate request
    req.validate().map_err(|err| AppError::BadRequest(err.to_string()))?;

    // Fetch account from database
    let account = sqlx::query_as::<_, GetProfileCredentials>(
        "SELECT password, username FROM profiles WHERE email = $1",
    )
    .bind(&req.email)
    .fetch_optional(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?
    .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;

    let req_email = req.email.clone();
    let req_password = req.password.clone();
    let account_password = account.password.clone();

    // Verify password using bcrypt
    let is_valid = spawn_blocking(move || verify(req_password.as_str(), &account_password))
        .await
        .map_err(|_| AppError::InternalServerError("Password verification error".to_string()))?
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if !is_valid {
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }

    let email_for_token = req_email.clone();
    let token = spawn_blocking(move || generate_token(&email_for_token))
        .await
        .map_err(|_| AppError::InternalServerError("Token generation error".to_string()))?
        .map_err(|_| AppError::InternalServerError("Token generation error".to_string()))?;

    // Return response
    Ok(HttpResponse::Ok().json(AuthResponse {
        email: req_email,
        username: account.username,
        token,
    }))
}

// POST /v1/register
pub async fn register(
    req: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    config: web::Data<EngineConfig>,
) -> Result<HttpResponse, AppError> {
    // Validate request
    req.validate()
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    validate_username(&req.username)?;

    if USERNAME_CACHE.get(&req.username.to_lowercase()).is_some() {
        return Err(AppError::UsernameNotAvailable("Username is not available".to_string()));
    }

    let password = req.password.clone();
    let email = req.email.clone();
    let username = req.username.clone();

    // Handle bcrypt hashing result properly
    let password_hash = spawn_blocking(move || hash(&password, 10))
        .await
        .map_err(|_| AppError::InternalServerError("Hashing failed".to_string()))?
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let user_id = spawn_blocking(uuid::Uuid::now_v7)
        .await
        .map_err(|_| AppError::InternalServerError("UUID generation failed".to_string()))?;

    // Profile and its momentum state are created as one unit
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO profiles (user_id, email, password, username, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        ON CONFLICT (email) DO NOTHING",
    )
    .bind(user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&username)
    .execute(&mut *tx)
    .await;

    let rows_affected = match result {
        Ok(res) => res.rows_affected(),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if db_err.constraint() == Some("profiles_username_key") {
                    return Err(AppError::UsernameNotAvailable("Username is not available".to_string()));
                }
            }
            return Err(AppError::InternalServerError(e.to_string()));
        }
    };

    if rows_affected == 0 {
        return Err(AppError::Conflict("Email already exists".to_string()));
    }

    let now = Utc::now();
    let shield_expires_at = now + config.shield_duration(1);
    sqlx::query(
        "INSERT INTO momentum_state
            (user_id, current_energy, current_momentum, lifetime_energy, lifetime_momentum, shield_expires_at, updated_at)
        VALUES ($1, 0, $2, 0, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(config.momentum_baseline)
    .bind(shield_expires_at)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    USERNAME_CACHE.insert(username.to_lowercase(), true);

    let email_for_token = email.clone();
    let token = spawn_blocking(move || generate_token(&email_for_token))
        .await
        .map_err(|_| AppError::InternalServerError("Token generation failed".to_string()))?
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // Return response
    Ok(HttpResponse::Created().json(AuthResponse {
        email,
        username,
        token,
    }))
}
