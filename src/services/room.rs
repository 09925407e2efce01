use crate::database::DbPool;
use crate::models::chat_room::{ChatRoom, RoomSummary};
use crate::models::message::Message;
use crate::models::user::PublicProfile;
use crate::utils::error::{AppError, AppResult};
use sqlx::Row;

/// Looks up the unique room for the unordered pair, creating it on first
/// contact. Two racing creations resolve to one row through the UNIQUE
/// constraint on the normalized pair: the losing insert is a no-op and the
/// re-select returns the winner.
pub async fn get_or_create_room(
    pool: &DbPool,
    user_a: &str,
    user_b: &str,
) -> AppResult<ChatRoom> {
    if user_a == user_b {
        return Err(AppError::BadRequest(
            "Cannot open a conversation with yourself".to_string(),
        ));
    }

    let other_active = sqlx::query(
        "SELECT COUNT(*) as count FROM users WHERE id = ? AND deactivated_at IS NULL",
    )
    .bind(user_b)
    .fetch_one(pool.as_ref())
    .await?
    .get::<i64, _>("count");

    if other_active == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let candidate = ChatRoom::new(user_a.to_string(), user_b.to_string());

    sqlx::query(
        "INSERT INTO chat_rooms (id, user1_id, user2_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (user1_id, user2_id) DO NOTHING",
    )
    .bind(&candidate.id)
    .bind(&candidate.user1_id)
    .bind(&candidate.user2_id)
    .bind(&candidate.created_at)
    .bind(&candidate.updated_at)
    .execute(pool.as_ref())
    .await?;

    let room = sqlx::query_as::<_, ChatRoom>(
        "SELECT * FROM chat_rooms WHERE user1_id = ? AND user2_id = ?",
    )
    .bind(&candidate.user1_id)
    .bind(&candidate.user2_id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(room)
}

pub async fn get_room(pool: &DbPool, room_id: &str) -> AppResult<ChatRoom> {
    sqlx::query_as::<_, ChatRoom>("SELECT * FROM chat_rooms WHERE id = ?")
        .bind(room_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Room not found".to_string()))
}

/// Hook invoked by the message service inside the send transaction so a
/// committed message and its room pointer are never observed apart.
pub async fn touch_room(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    room_id: &str,
    message: &Message,
) -> AppResult<()> {
    sqlx::query("UPDATE chat_rooms SET last_message_id = ?, updated_at = ? WHERE id = ?")
        .bind(&message.id)
        .bind(&message.created_at)
        .bind(room_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// One summary per room the viewer participates in, most recent activity
/// first. The unread count is recomputed per call rather than denormalized.
pub async fn list_rooms_for(pool: &DbPool, viewer_id: &str) -> AppResult<Vec<RoomSummary>> {
    let rooms = sqlx::query_as::<_, ChatRoom>(
        "SELECT * FROM chat_rooms WHERE user1_id = ? OR user2_id = ? ORDER BY updated_at DESC",
    )
    .bind(viewer_id)
    .bind(viewer_id)
    .fetch_all(pool.as_ref())
    .await?;

    let mut summaries = Vec::with_capacity(rooms.len());

    for room in rooms {
        let other_id = room.other_user_id(viewer_id).to_string();

        let other_user = sqlx::query_as::<_, PublicProfile>(
            "SELECT id, username, display_name, avatar_url, is_online, last_seen
             FROM users WHERE id = ?",
        )
        .bind(&other_id)
        .fetch_one(pool.as_ref())
        .await?;

        let last_message = match &room.last_message_id {
            Some(message_id) => {
                sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
                    .bind(message_id)
                    .fetch_optional(pool.as_ref())
                    .await?
            }
            None => None,
        };

        let unread_count = sqlx::query(
            "SELECT COUNT(*) as count FROM messages
             WHERE sender_id = ? AND receiver_id = ? AND is_read = 0",
        )
        .bind(&other_id)
        .bind(viewer_id)
        .fetch_one(pool.as_ref())
        .await?
        .get::<i64, _>("count");

        summaries.push(RoomSummary {
            room,
            other_user,
            last_message,
            unread_count,
        });
    }

    Ok(summaries)
}
