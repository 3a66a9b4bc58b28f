use actix_web::{web, HttpResponse};

use crate::errors::AppError;
use crate::models::catalog::ActivityReference;

// GET /v1/catalog
//
// Ordered by class then label so clients can group into sections directly.
pub async fn list_activities(
    pool: web::Data<sqlx::PgPool>,
) -> Result<HttpResponse, AppError> {
    let activities = sqlx::query_as::<_, ActivityReference>(
        "SELECT id, activity_class, activity_label, allowed_units
        FROM activity_reference
        ORDER BY activity_class, activity_label",
    )
    .fetch_all(&**pool)
    .await
    .map_err(|_| AppError::InternalServerError("Database error".to_string()))?;

    Ok(HttpResponse::Ok().json(activities))
}
