use serde::Serialize;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub struct GetProfileCredentials {
    pub password: String,
    pub username: String,
}

#[derive(sqlx::FromRow)]
pub struct GetProfileId {
    pub user_id: Uuid,
}

/// Fields every viewer may see regardless of the visibility gate.
#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicEnvelope {
    #[serde(rename = "id")]
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_public: bool,
}
