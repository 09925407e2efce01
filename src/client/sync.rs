use std::time::Duration;
use tokio::sync::mpsc;

use super::api::{ChatApi, ClientResult};
use super::cache::ChatCache;
use crate::models::message::Message;
use crate::services::message::DEFAULT_PAGE_SIZE;
use crate::services::presence::HEARTBEAT_INTERVAL_SECS;

/// Upper bound on the shutdown goodbye; teardown must never wait on a
/// hung server.
const GOODBYE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug)]
pub enum SyncCommand {
    VisibilityChanged(Visibility),
    OpenThread { room_id: String },
    SendMessage { receiver_id: String, content: String },
    Refresh,
    Shutdown,
}

/// An unsent message kept around after a failed send so the user can retry
/// without retyping.
#[derive(Debug, Clone)]
pub struct Draft {
    pub receiver_id: String,
    pub content: String,
}

/// Single-task cooperative sync loop: a heartbeat/poll tick interleaves
/// with UI commands on one task, never concurrently with itself.
pub struct SyncLoop {
    api: ChatApi,
    cache: ChatCache,
    visibility: Visibility,
    open_room: Option<String>,
    draft: Option<Draft>,
}

impl SyncLoop {
    pub fn new(api: ChatApi) -> Self {
        Self {
            api,
            cache: ChatCache::new(),
            visibility: Visibility::Visible,
            open_room: None,
            draft: None,
        }
    }

    pub fn cache(&self) -> &ChatCache {
        &self.cache
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Periodic presence assertion. Failures are logged and dropped; the
    /// next tick is the retry.
    pub async fn heartbeat_tick(&self) {
        if self.visibility == Visibility::Visible {
            if let Err(e) = self.api.set_presence(true).await {
                tracing::debug!("Dropped heartbeat: {}", e);
            }
        }
    }

    pub async fn set_visibility(&mut self, visibility: Visibility) {
        if visibility == self.visibility {
            return;
        }
        self.visibility = visibility;

        let is_online = visibility == Visibility::Visible;
        if let Err(e) = self.api.set_presence(is_online).await {
            tracing::debug!("Dropped presence update: {}", e);
        }

        self.cache.invalidated_by_visibility();
    }

    /// Walks the cursor until a short page so long threads are complete;
    /// a single unpaged fetch would stop at the oldest page and miss the
    /// newest messages.
    async fn fetch_full_thread(&self, room_id: &str) -> ClientResult<Vec<Message>> {
        let mut messages: Vec<Message> = Vec::new();

        loop {
            let after = messages.last().map(|m| m.id.clone());
            let page = self
                .api
                .fetch_thread(room_id, after.as_deref(), Some(DEFAULT_PAGE_SIZE))
                .await?;

            let short_page = (page.len() as i64) < DEFAULT_PAGE_SIZE;
            messages.extend(page);

            if short_page {
                return Ok(messages);
            }
        }
    }

    /// Fetches the whole thread and only then acknowledges it; nothing is
    /// marked read before it could have been shown.
    pub async fn open_thread(&mut self, room_id: &str) -> ClientResult<()> {
        self.open_room = Some(room_id.to_string());

        let messages = self.fetch_full_thread(room_id).await?;
        self.cache.store_thread(room_id, messages);

        let marked = self.api.mark_room_read(room_id).await?;
        if marked > 0 {
            self.cache.invalidated_by_read();
        }

        Ok(())
    }

    /// On failure the draft is retained; the input is never lost.
    pub async fn send(&mut self, receiver_id: &str, content: &str) -> ClientResult<Message> {
        self.draft = Some(Draft {
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
        });

        let message = self.api.send_message(receiver_id, content).await?;

        self.draft = None;
        if let Some(room_id) = self.open_room.clone() {
            self.cache.append_to_thread(&room_id, message.clone());
        }
        self.cache.invalidated_by_send();

        Ok(message)
    }

    /// Refetches whatever the cache has flagged stale.
    pub async fn poll(&mut self) -> ClientResult<()> {
        if self.cache.needs_rooms() {
            let rooms = self.api.list_rooms().await?;
            self.cache.store_rooms(rooms);
        }

        if let Some(room_id) = self.open_room.clone()
            && self.cache.needs_thread(&room_id)
        {
            let messages = self.fetch_full_thread(&room_id).await?;
            self.cache.store_thread(&room_id, messages);
        }

        Ok(())
    }

    /// One poll cycle: assert presence, flag the live views as stale, and
    /// refetch them. Incoming traffic only ever reaches the cache through
    /// this refetch, so a populated cache must not satisfy the next cycle.
    pub async fn tick(&mut self) -> ClientResult<()> {
        self.heartbeat_tick().await;
        self.cache.invalidated_by_interval();
        self.poll().await
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<SyncCommand>) {
        let mut heartbeat =
            tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::warn!("Poll failed: {}", e);
                    }
                }
                command = commands.recv() => {
                    match command {
                        None | Some(SyncCommand::Shutdown) => {
                            // Best-effort goodbye, must not delay teardown.
                            let _ = tokio::time::timeout(
                                GOODBYE_TIMEOUT,
                                self.api.set_presence(false),
                            )
                            .await;
                            break;
                        }
                        Some(SyncCommand::VisibilityChanged(visibility)) => {
                            self.set_visibility(visibility).await;
                        }
                        Some(SyncCommand::OpenThread { room_id }) => {
                            if let Err(e) = self.open_thread(&room_id).await {
                                tracing::warn!("Failed to open thread {}: {}", room_id, e);
                            }
                        }
                        Some(SyncCommand::SendMessage { receiver_id, content }) => {
                            if let Err(e) = self.send(&receiver_id, &content).await {
                                tracing::warn!("Send failed, draft retained: {}", e);
                            }
                        }
                        Some(SyncCommand::Refresh) => {
                            if let Err(e) = self.poll().await {
                                tracing::warn!("Refresh failed: {}", e);
                            }
                        }
                    }
                }
            }
        }
    }
}
