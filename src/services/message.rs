use crate::database::DbPool;
use crate::models::message::Message;
use crate::services::room;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::validate_message_content;
use sqlx::Row;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// Persists a message and updates the pair's room pointer in one
/// transaction, so the room list never shows a stale last message for a
/// committed send.
pub async fn send_message(
    pool: &DbPool,
    sender_id: &str,
    receiver_id: &str,
    content: String,
) -> AppResult<Message> {
    validate_message_content(&content)?;

    if sender_id == receiver_id {
        return Err(AppError::BadRequest(
            "Cannot send a message to yourself".to_string(),
        ));
    }

    let receiver_active = sqlx::query(
        "SELECT COUNT(*) as count FROM users WHERE id = ? AND deactivated_at IS NULL",
    )
    .bind(receiver_id)
    .fetch_one(pool.as_ref())
    .await?
    .get::<i64, _>("count");

    if receiver_active == 0 {
        return Err(AppError::NotFound("Recipient not found".to_string()));
    }

    let room = room::get_or_create_room(pool, sender_id, receiver_id).await?;
    let message = Message::new(
        sender_id.to_string(),
        receiver_id.to_string(),
        content,
    );

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO messages (id, sender_id, receiver_id, content, is_read, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.sender_id)
    .bind(&message.receiver_id)
    .bind(&message.content)
    .bind(message.is_read)
    .bind(&message.created_at)
    .execute(&mut *tx)
    .await?;

    room::touch_room(&mut tx, &room.id, &message).await?;

    tx.commit().await?;

    Ok(message)
}

/// Read acknowledgement for an explicit set of messages. All-or-nothing:
/// a single id not addressed to the reader rejects the whole batch and
/// leaves every row untouched.
pub async fn mark_read(
    pool: &DbPool,
    message_ids: &[String],
    reader_id: &str,
) -> AppResult<u64> {
    if message_ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;

    for message_id in message_ids {
        let receiver: Option<String> =
            sqlx::query_scalar("SELECT receiver_id FROM messages WHERE id = ?")
                .bind(message_id)
                .fetch_optional(&mut *tx)
                .await?;

        match receiver {
            None => {
                return Err(AppError::NotFound("Message not found".to_string()));
            }
            Some(receiver) if receiver != reader_id => {
                return Err(AppError::Forbidden(
                    "Cannot mark messages addressed to another user".to_string(),
                ));
            }
            Some(_) => {}
        }
    }

    let mut marked = 0;
    for message_id in message_ids {
        let result = sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ? AND is_read = 0")
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        marked += result.rows_affected();
    }

    tx.commit().await?;

    Ok(marked)
}

/// Thread-open acknowledgement: flips everything unread addressed to the
/// reader within the room's pair.
pub async fn mark_room_read(pool: &DbPool, room_id: &str, reader_id: &str) -> AppResult<u64> {
    let room = room::get_room(pool, room_id).await?;

    if !room.has_participant(reader_id) {
        return Err(AppError::Forbidden(
            "You are not part of this conversation".to_string(),
        ));
    }

    let other_id = room.other_user_id(reader_id);

    let result = sqlx::query(
        "UPDATE messages SET is_read = 1
         WHERE sender_id = ? AND receiver_id = ? AND is_read = 0",
    )
    .bind(other_id)
    .bind(reader_id)
    .execute(pool.as_ref())
    .await?;

    Ok(result.rows_affected())
}

/// Messages between the pair in (created_at, id) ascending order. `after`
/// is a message-id cursor; passing the last id of one page resumes the
/// scan without re-reading earlier rows.
pub async fn list_between(
    pool: &DbPool,
    user_a: &str,
    user_b: &str,
    after: Option<&str>,
    limit: Option<i64>,
) -> AppResult<Vec<Message>> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let cursor = match after {
        Some(message_id) => {
            let row = sqlx::query("SELECT created_at, id FROM messages WHERE id = ?")
                .bind(message_id)
                .fetch_optional(pool.as_ref())
                .await?
                .ok_or_else(|| AppError::BadRequest("Unknown cursor".to_string()))?;
            Some((
                row.get::<String, _>("created_at"),
                row.get::<String, _>("id"),
            ))
        }
        None => None,
    };

    let messages = match cursor {
        Some((created_at, id)) => {
            sqlx::query_as::<_, Message>(
                "SELECT * FROM messages
                 WHERE ((sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?))
                   AND (created_at > ? OR (created_at = ? AND id > ?))
                 ORDER BY created_at ASC, id ASC LIMIT ?",
            )
            .bind(user_a)
            .bind(user_b)
            .bind(user_b)
            .bind(user_a)
            .bind(&created_at)
            .bind(&created_at)
            .bind(&id)
            .bind(limit)
            .fetch_all(pool.as_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, Message>(
                "SELECT * FROM messages
                 WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
                 ORDER BY created_at ASC, id ASC LIMIT ?",
            )
            .bind(user_a)
            .bind(user_b)
            .bind(user_b)
            .bind(user_a)
            .bind(limit)
            .fetch_all(pool.as_ref())
            .await?
        }
    };

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::models::user::User;
    use crate::services::room::{get_or_create_room, list_rooms_for};
    use std::time::Duration;

    async fn seed_user(pool: &DbPool, username: &str) -> String {
        let user = User::new(
            username.to_string(),
            "hash".to_string(),
            username.to_string(),
        );
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, display_name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(&user.created_at)
        .execute(pool.as_ref())
        .await
        .unwrap();
        user.id
    }

    #[tokio::test]
    async fn test_send_and_list_in_creation_order() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        for text in ["first", "second", "third"] {
            send_message(&pool, &a, &b, text.to_string()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let messages = list_between(&pool, &a, &b, None, None).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_invalid_content_persists_nothing() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        let empty = send_message(&pool, &a, &b, String::new()).await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let oversized = send_message(&pool, &a, &b, "x".repeat(1001)).await;
        assert!(matches!(oversized, Err(AppError::Validation(_))));

        let count = sqlx::query("SELECT COUNT(*) as count FROM messages")
            .fetch_one(pool.as_ref())
            .await
            .unwrap()
            .get::<i64, _>("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_send_updates_room_pointer() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        let message = send_message(&pool, &a, &b, "hi".to_string()).await.unwrap();

        let room = get_or_create_room(&pool, &a, &b).await.unwrap();
        assert_eq!(room.last_message_id.as_deref(), Some(message.id.as_str()));
        assert_eq!(room.updated_at, message.created_at);
    }

    #[tokio::test]
    async fn test_concurrent_sends_both_visible() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        let (r1, r2) = tokio::join!(
            send_message(&pool, &a, &b, "from anna".to_string()),
            send_message(&pool, &b, &a, "from ben".to_string()),
        );
        r1.unwrap();
        r2.unwrap();

        let messages = list_between(&pool, &a, &b, None, None).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_cursor_pagination_is_restartable() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        for i in 0..5 {
            send_message(&pool, &a, &b, format!("msg {}", i)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let first_page = list_between(&pool, &a, &b, None, Some(2)).await.unwrap();
        assert_eq!(first_page.len(), 2);

        let cursor = first_page.last().unwrap().id.clone();
        let second_page = list_between(&pool, &a, &b, Some(&cursor), Some(2))
            .await
            .unwrap();
        assert_eq!(second_page.len(), 2);

        let cursor = second_page.last().unwrap().id.clone();
        let last_page = list_between(&pool, &a, &b, Some(&cursor), Some(2))
            .await
            .unwrap();
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_page[0].content, "msg 4");
    }

    #[tokio::test]
    async fn test_cursor_walk_reaches_newest_of_long_thread() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        // One message past the default page size, so a single unpaged
        // fetch would stop short of the newest one.
        for i in 0..=DEFAULT_PAGE_SIZE {
            send_message(&pool, &a, &b, format!("msg {}", i)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let mut collected: Vec<Message> = Vec::new();
        loop {
            let after = collected.last().map(|m| m.id.clone());
            let page = list_between(&pool, &a, &b, after.as_deref(), Some(DEFAULT_PAGE_SIZE))
                .await
                .unwrap();
            let short_page = (page.len() as i64) < DEFAULT_PAGE_SIZE;
            collected.extend(page);
            if short_page {
                break;
            }
        }

        assert_eq!(collected.len() as i64, DEFAULT_PAGE_SIZE + 1);
        assert_eq!(
            collected.last().unwrap().content,
            format!("msg {}", DEFAULT_PAGE_SIZE)
        );
    }

    #[tokio::test]
    async fn test_mark_read_rejected_for_non_receiver() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;
        let c = seed_user(&pool, "carl").await;

        let message = send_message(&pool, &a, &b, "hi".to_string()).await.unwrap();

        let err = mark_read(&pool, &[message.id.clone()], &c).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let is_read: i64 = sqlx::query_scalar("SELECT is_read FROM messages WHERE id = ?")
            .bind(&message.id)
            .fetch_one(pool.as_ref())
            .await
            .unwrap();
        assert_eq!(is_read, 0);
    }

    #[tokio::test]
    async fn test_mark_read_batch_is_all_or_nothing() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        let to_b = send_message(&pool, &a, &b, "for ben".to_string()).await.unwrap();
        let to_a = send_message(&pool, &b, &a, "for anna".to_string()).await.unwrap();

        // The second id is addressed to Anna, so Ben's batch must not touch
        // either row.
        let err = mark_read(&pool, &[to_b.id.clone(), to_a.id.clone()], &b)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let unread: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE is_read = 0")
                .fetch_one(pool.as_ref())
                .await
                .unwrap();
        assert_eq!(unread, 2);

        let marked = mark_read(&pool, &[to_b.id.clone()], &b).await.unwrap();
        assert_eq!(marked, 1);
    }

    #[tokio::test]
    async fn test_unread_count_scenario() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        send_message(&pool, &a, &b, "Hallo".to_string()).await.unwrap();

        let rooms = list_rooms_for(&pool, &b).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].unread_count, 1);
        assert_eq!(
            rooms[0].last_message.as_ref().unwrap().content,
            "Hallo"
        );

        let marked = mark_room_read(&pool, &rooms[0].room.id, &b).await.unwrap();
        assert_eq!(marked, 1);

        let rooms = list_rooms_for(&pool, &b).await.unwrap();
        assert_eq!(rooms[0].unread_count, 0);
    }

    #[tokio::test]
    async fn test_mark_room_read_requires_participant() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;
        let c = seed_user(&pool, "carl").await;

        send_message(&pool, &a, &b, "hi".to_string()).await.unwrap();
        let room = get_or_create_room(&pool, &a, &b).await.unwrap();

        let err = mark_room_read(&pool, &room.id, &c).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
