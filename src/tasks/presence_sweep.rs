use chrono::Duration;
use std::time::Duration as StdDuration;

use crate::database::DbPool;
use crate::services::presence;

/// Background reaper for the presence flag. Clients that crash or lose
/// connectivity never report the offline transition, so anyone whose
/// heartbeat is older than the window is forced offline here.
pub fn start_presence_sweep(db: DbPool, window_secs: i64) {
    tokio::spawn(async move {
        let window = Duration::seconds(window_secs);
        let mut interval = tokio::time::interval(StdDuration::from_secs(
            presence::HEARTBEAT_INTERVAL_SECS,
        ));

        loop {
            interval.tick().await;

            match presence::sweep_stale(&db, window).await {
                Ok(0) => {}
                Ok(flipped) => {
                    tracing::info!("Presence sweep forced {} stale users offline", flipped);
                }
                Err(e) => {
                    tracing::warn!("Presence sweep failed: {}", e);
                }
            }
        }
    });
}
