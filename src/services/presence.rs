use crate::database::DbPool;
use crate::utils::error::AppResult;
use chrono::{Duration, Utc};

/// Clients are expected to heartbeat every 30s while visible.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// A user with no heartbeat for this long is considered gone even if the
/// client never reported the offline transition.
pub const DEFAULT_PRESENCE_WINDOW_SECS: i64 = 90;

/// Idempotent presence upsert. Going online (or heartbeating) refreshes
/// `last_heartbeat`; going offline stamps `last_seen`. Returns whether the
/// flag actually flipped, so callers can skip fan-out for plain heartbeats.
pub async fn set_online(pool: &DbPool, user_id: &str, is_online: bool) -> AppResult<bool> {
    let previous: Option<i64> = sqlx::query_scalar("SELECT is_online FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool.as_ref())
        .await?;

    let now = Utc::now().to_rfc3339();

    if is_online {
        sqlx::query(
            "UPDATE users SET is_online = 1, last_heartbeat = ?
             WHERE id = ? AND deactivated_at IS NULL",
        )
        .bind(&now)
        .bind(user_id)
        .execute(pool.as_ref())
        .await?;
    } else {
        sqlx::query("UPDATE users SET is_online = 0, last_seen = ? WHERE id = ?")
            .bind(&now)
            .bind(user_id)
            .execute(pool.as_ref())
            .await?;
    }

    Ok(previous.map(|p| (p != 0) != is_online).unwrap_or(false))
}

/// Forces offline every user whose heartbeat is older than the window.
/// A crashed client never reports the offline transition, so the flag has
/// to be reaped server-side. Returns the number of users flipped.
pub async fn sweep_stale(pool: &DbPool, window: Duration) -> AppResult<u64> {
    let cutoff = (Utc::now() - window).to_rfc3339();

    let result = sqlx::query(
        "UPDATE users SET is_online = 0, last_seen = COALESCE(last_heartbeat, last_seen)
         WHERE is_online = 1 AND (last_heartbeat IS NULL OR last_heartbeat < ?)",
    )
    .bind(&cutoff)
    .execute(pool.as_ref())
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::models::user::User;
    use sqlx::Row;

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

    async fn presence_row(pool: &DbPool, user_id: &str) -> (i64, Option<String>, Option<String>) {
        let row = sqlx::query("SELECT is_online, last_seen, last_heartbeat FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(pool.as_ref())
            .await
            .unwrap();
        (
            row.get("is_online"),
            row.get("last_seen"),
            row.get("last_heartbeat"),
        )
    }

    #[tokio::test]
    async fn test_online_then_offline_stamps_last_seen() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "anna").await;

        set_online(&pool, &user, true).await.unwrap();
        let (online, _, heartbeat) = presence_row(&pool, &user).await;
        assert_eq!(online, 1);
        assert!(heartbeat.is_some());

        let before_offline = Utc::now().to_rfc3339();
        set_online(&pool, &user, false).await.unwrap();
        let (online, last_seen, _) = presence_row(&pool, &user).await;
        assert_eq!(online, 0);
        assert!(last_seen.unwrap() >= before_offline);
    }

    #[tokio::test]
    async fn test_set_online_is_idempotent() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "anna").await;

        assert!(set_online(&pool, &user, true).await.unwrap());
        assert!(!set_online(&pool, &user, true).await.unwrap());
        let (online, _, _) = presence_row(&pool, &user).await;
        assert_eq!(online, 1);
    }

    #[tokio::test]
    async fn test_sweep_flips_stale_users_only() {
        let pool = test_pool().await;
        let stale = seed_user(&pool, "stale").await;
        let fresh = seed_user(&pool, "fresh").await;

        set_online(&pool, &stale, true).await.unwrap();
        set_online(&pool, &fresh, true).await.unwrap();

        let old = (Utc::now() - Duration::seconds(600)).to_rfc3339();
        sqlx::query("UPDATE users SET last_heartbeat = ? WHERE id = ?")
            .bind(&old)
            .bind(&stale)
            .execute(pool.as_ref())
            .await
            .unwrap();

        let flipped = sweep_stale(&pool, Duration::seconds(DEFAULT_PRESENCE_WINDOW_SECS))
            .await
            .unwrap();
        assert_eq!(flipped, 1);

        let (online, last_seen, _) = presence_row(&pool, &stale).await;
        assert_eq!(online, 0);
        assert_eq!(last_seen.unwrap(), old);

        let (online, _, _) = presence_row(&pool, &fresh).await;
        assert_eq!(online, 1);
    }
}
