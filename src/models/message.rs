use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: i64,
    pub created_at: String,
}

impl Message {
    pub fn new(sender_id: String, receiver_id: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id,
            receiver_id,
            content,
            is_read: 0,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
