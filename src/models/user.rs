use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_online: i64,
    pub last_seen: Option<String>,
    pub last_heartbeat: Option<String>,
    pub created_at: String,
    pub deactivated_at: Option<String>,
}

impl User {
    pub fn new(username: String, password_hash: String, display_name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash,
            display_name,
            avatar_url: None,
            is_online: 0,
            last_seen: None,
            last_heartbeat: None,
            created_at: Utc::now().to_rfc3339(),
            deactivated_at: None,
        }
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated_at.is_some()
    }
}

/// Profile fields the counterpart in a conversation is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_online: i64,
    pub last_seen: Option<String>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            is_online: user.is_online,
            last_seen: user.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
}
