use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::message::Message;
use crate::models::user::PublicProfile;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatRoom {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub last_message_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ChatRoom {
    /// The pair is stored normalized so (A, B) and (B, A) map to one row.
    pub fn new(mut user1_id: String, mut user2_id: String) -> Self {
        if user1_id > user2_id {
            std::mem::swap(&mut user1_id, &mut user2_id);
        }

        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            user1_id,
            user2_id,
            last_message_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn other_user_id(&self, viewer_id: &str) -> &str {
        if self.user1_id == viewer_id {
            &self.user2_id
        } else {
            &self.user1_id
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }
}

/// Read-time projection of a room for one viewer; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    #[serde(flatten)]
    pub room: ChatRoom,
    pub other_user: PublicProfile,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}
