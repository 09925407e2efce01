use crate::database::DbPool;
use crate::models::user::{PublicProfile, User};
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;

pub async fn get_user(pool: &DbPool, user_id: &str) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn get_profile(pool: &DbPool, user_id: &str) -> AppResult<PublicProfile> {
    let profile = sqlx::query_as::<_, PublicProfile>(
        "SELECT id, username, display_name, avatar_url, is_online, last_seen
         FROM users WHERE id = ? AND deactivated_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(profile)
}

/// Soft delete. The account can no longer authenticate or receive
/// messages, but its rows stay so the other party's history keeps
/// rendering. Presence is forced offline in the same statement.
pub async fn deactivate_user(pool: &DbPool, user_id: &str) -> AppResult<()> {
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE users SET deactivated_at = ?, is_online = 0, last_seen = ?
         WHERE id = ? AND deactivated_at IS NULL",
    )
    .bind(&now)
    .bind(&now)
    .bind(user_id)
    .execute(pool.as_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::services::message::send_message;
    use crate::services::room::list_rooms_for;

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
    async fn test_deactivated_user_cannot_be_messaged() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;
        let b = seed_user(&pool, "ben").await;

        send_message(&pool, &a, &b, "hi".to_string()).await.unwrap();
        deactivate_user(&pool, &b).await.unwrap();

        let err = send_message(&pool, &a, &b, "still there?".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // History survives for the remaining party.
        let rooms = list_rooms_for(&pool, &a).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].last_message.as_ref().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn test_deactivate_forces_offline() {
        let pool = test_pool().await;
        let a = seed_user(&pool, "anna").await;

        crate::services::presence::set_online(&pool, &a, true)
            .await
            .unwrap();
        deactivate_user(&pool, &a).await.unwrap();

        let user = get_user(&pool, &a).await.unwrap();
        assert_eq!(user.is_online, 0);
        assert!(user.is_deactivated());
    }
}
