use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use chrono::Utc;

use crate::errors::AppError;
use crate::handlers::current_user_id;
use crate::models::follow::{Follow, FollowStatus, GetFollowStatus};
use crate::models::profile::PublicEnvelope;

// POST /v1/follows/{targetId}
//
// Public targets are followed immediately; private ones get a pending
// request the target must accept.
pub async fn request_follow(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    target_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let follower_id = current_user_id(&req, &pool).await?;
    let target_id = *target_id;

    if follower_id == target_id {
        return Err(AppError::BadRequest("You cannot follow yourself".to_string()));
    }

    let (is_public,): (bool,) =
        sqlx::query_as("SELECT is_public FROM profiles WHERE user_id = $1")
            .bind(target_id)
            .fetch_optional(&**pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let status = if is_public {
        FollowStatus::Accepted
    } else {
        FollowStatus::Pending
    };

    let result = sqlx::query(
        "INSERT INTO follows (follower_id, followed_id, status, created_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (follower_id, followed_id) DO NOTHING",
    )
    .bind(follower_id)
    .bind(target_id)
    .bind(status)
    .bind(Utc::now())
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        let existing = sqlx::query_as::<_, GetFollowStatus>(
            "SELECT status FROM follows WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(target_id)
        .fetch_one(&**pool)
        .await?;

        return Err(match existing.status {
            FollowStatus::Accepted => AppError::Conflict("Already following".to_string()),
            FollowStatus::Pending => AppError::Conflict("Already requested".to_string()),
        });
    }

    let follow = sqlx::query_as::<_, Follow>(
        "SELECT follower_id, followed_id, status, created_at
        FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(follower_id)
    .bind(target_id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(follow))
}

#[derive(Deserialize)]
pub enum FollowRequestAction {
    #[serde(rename = "accept")]
    Accept,
    #[serde(rename = "deny")]
    Deny,
}

#[derive(Deserialize)]
pub struct ManageFollowRequest {
    pub action: FollowRequestAction,
}

// POST /v1/follows/requests/{requestorId}
//
// Scoped to the authenticated callee, so nobody can act on requests
// addressed to someone else.
pub async fn manage_follow_request(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    requestor_id: web::Path<Uuid>,
    payload: web::Json<ManageFollowRequest>,
) -> Result<HttpResponse, AppError> {
    let owner_id = current_user_id(&req, &pool).await?;

    match payload.action {
        FollowRequestAction::Accept => {
            let result = sqlx::query(
                "UPDATE follows SET status = 'accepted'
                WHERE follower_id = $1 AND followed_id = $2 AND status = 'pending'",
            )
            .bind(*requestor_id)
            .bind(owner_id)
            .execute(&**pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound("No pending follow request".to_string()));
            }

            let follow = sqlx::query_as::<_, Follow>(
                "SELECT follower_id, followed_id, status, created_at
                FROM follows WHERE follower_id = $1 AND followed_id = $2",
            )
            .bind(*requestor_id)
            .bind(owner_id)
            .fetch_one(&**pool)
            .await?;

            Ok(HttpResponse::Ok().json(follow))
        }
        FollowRequestAction::Deny => {
            let result = sqlx::query(
                "DELETE FROM follows
                WHERE follower_id = $1 AND followed_id = $2 AND status = 'pending'",
            )
            .bind(*requestor_id)
            .bind(owner_id)
            .execute(&**pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound("No pending follow request".to_string()));
            }

            Ok(HttpResponse::Ok().json(serde_json::json!({ "denied": *requestor_id })))
        }
    }
}

// GET /v1/follows/requests
//
// Incoming pending requestors, newest first. This is what the accept/deny
// list on the profile page is built from.
pub async fn get_pending_follow_requests(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let owner_id = current_user_id(&req, &pool).await?;
    let (limit, offset) = page_window(query.limit, query.offset);

    let requestors = sqlx::query_as::<_, PublicEnvelope>(
        "SELECT p.user_id, p.username, p.display_name, p.avatar_url, p.is_public
        FROM follows f
        JOIN profiles p ON p.user_id = f.follower_id
        WHERE f.followed_id = $1 AND f.status = 'pending'
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3",
    )
    .bind(owner_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(requestors))
}

// DELETE /v1/follows/{targetId}
//
// Also used to cancel a still-pending outgoing request.
pub async fn unfollow(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    target_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let follower_id = current_user_id(&req, &pool).await?;

    let result = sqlx::query(
        "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(follower_id)
    .bind(*target_id)
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not following".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "unfollowed": *target_id })))
}

#[derive(Deserialize)]
pub struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

fn page_window(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(20).clamp(1, 50), offset.unwrap_or(0).max(0))
}

// GET /v1/profiles/{profileId}/followers
pub async fn get_followers(
    pool: web::Data<sqlx::PgPool>,
    profile_id: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let (limit, offset) = page_window(query.limit, query.offset);

    let followers = sqlx::query_as::<_, PublicEnvelope>(
        "SELECT p.user_id, p.username, p.display_name, p.avatar_url, p.is_public
        FROM follows f
        JOIN profiles p ON p.user_id = f.follower_id
        WHERE f.followed_id = $1 AND f.status = 'accepted'
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3",
    )
    .bind(*profile_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(followers))
}

// GET /v1/profiles/{profileId}/following
pub async fn get_following(
    pool: web::Data<sqlx::PgPool>,
    profile_id: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let (limit, offset) = page_window(query.limit, query.offset);

    let following = sqlx::query_as::<_, PublicEnvelope>(
        "SELECT p.user_id, p.username, p.display_name, p.avatar_url, p.is_public
        FROM follows f
        JOIN profiles p ON p.user_id = f.followed_id
        WHERE f.follower_id = $1 AND f.status = 'accepted'
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3",
    )
    .bind(*profile_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(following))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None), (20, 0));
        assert_eq!(page_window(Some(500), Some(-3)), (50, 0));
        assert_eq!(page_window(Some(0), Some(40)), (1, 40));
    }
}
