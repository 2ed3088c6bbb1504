use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub user_type: String,
    pub created_at: String,
}

/// The shape returned to clients. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "userType")]
    pub user_type: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            user_type: user.user_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    pub mode: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    #[serde(rename = "userType")]
    pub user_type: Option<String>,
}
