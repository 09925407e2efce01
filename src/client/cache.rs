use std::collections::HashMap;

use crate::models::chat_room::RoomSummary;
use crate::models::message::Message;

struct CachedThread {
    messages: Vec<Message>,
    stale: bool,
}

/// Client-side view state. Nothing here is implicit: every way a view can
/// become stale is a named method, and the poll loop refetches exactly
/// what is flagged.
#[derive(Default)]
pub struct ChatCache {
    rooms: Option<Vec<RoomSummary>>,
    rooms_stale: bool,
    threads: HashMap<String, CachedThread>,
}

impl ChatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooms(&self) -> Option<&[RoomSummary]> {
        self.rooms.as_deref()
    }

    pub fn needs_rooms(&self) -> bool {
        self.rooms.is_none() || self.rooms_stale
    }

    pub fn store_rooms(&mut self, rooms: Vec<RoomSummary>) {
        self.rooms = Some(rooms);
        self.rooms_stale = false;
    }

    pub fn thread(&self, room_id: &str) -> Option<&[Message]> {
        self.threads.get(room_id).map(|t| t.messages.as_slice())
    }

    pub fn needs_thread(&self, room_id: &str) -> bool {
        match self.threads.get(room_id) {
            Some(thread) => thread.stale,
            None => true,
        }
    }

    pub fn store_thread(&mut self, room_id: &str, messages: Vec<Message>) {
        self.threads.insert(
            room_id.to_string(),
            CachedThread {
                messages,
                stale: false,
            },
        );
    }

    pub fn append_to_thread(&mut self, room_id: &str, message: Message) {
        if let Some(thread) = self.threads.get_mut(room_id) {
            thread.messages.push(message);
        }
    }

    /// A successful send reorders the room list and changes its last
    /// message, so it has to be refetched.
    pub fn invalidated_by_send(&mut self) {
        self.rooms_stale = true;
    }

    /// Acknowledging reads changes unread counts in the room list.
    pub fn invalidated_by_read(&mut self) {
        self.rooms_stale = true;
    }

    /// Becoming visible again after an absence: presence dots and unread
    /// counts may have moved, refetch the presence-dependent views.
    pub fn invalidated_by_visibility(&mut self) {
        self.rooms_stale = true;
        for thread in self.threads.values_mut() {
            thread.stale = true;
        }
    }

    /// Every poll interval flags the live views; the other side may have
    /// written at any time, so a populated cache only holds until the
    /// next tick.
    pub fn invalidated_by_interval(&mut self) {
        self.rooms_stale = true;
        for thread in self.threads.values_mut() {
            thread.stale = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: &str) -> Message {
        Message::new("sender".to_string(), "receiver".to_string(), content.to_string())
    }

    #[test]
    fn test_fresh_cache_needs_everything() {
        let cache = ChatCache::new();
        assert!(cache.needs_rooms());
        assert!(cache.needs_thread("room-1"));
    }

    #[test]
    fn test_store_clears_staleness() {
        let mut cache = ChatCache::new();
        cache.store_rooms(vec![]);
        cache.store_thread("room-1", vec![message("hi")]);

        assert!(!cache.needs_rooms());
        assert!(!cache.needs_thread("room-1"));
        assert_eq!(cache.thread("room-1").unwrap().len(), 1);
    }

    #[test]
    fn test_send_invalidates_room_list_only() {
        let mut cache = ChatCache::new();
        cache.store_rooms(vec![]);
        cache.store_thread("room-1", vec![]);

        cache.invalidated_by_send();
        assert!(cache.needs_rooms());
        assert!(!cache.needs_thread("room-1"));
    }

    #[test]
    fn test_visibility_invalidates_rooms_and_threads() {
        let mut cache = ChatCache::new();
        cache.store_rooms(vec![]);
        cache.store_thread("room-1", vec![]);

        cache.invalidated_by_visibility();
        assert!(cache.needs_rooms());
        assert!(cache.needs_thread("room-1"));
    }

    #[test]
    fn test_interval_invalidates_rooms_and_threads() {
        let mut cache = ChatCache::new();
        cache.store_rooms(vec![]);
        cache.store_thread("room-1", vec![message("hi")]);

        cache.invalidated_by_interval();
        assert!(cache.needs_rooms());
        assert!(cache.needs_thread("room-1"));
    }

    #[test]
    fn test_append_keeps_thread_fresh() {
        let mut cache = ChatCache::new();
        cache.store_thread("room-1", vec![message("first")]);

        cache.append_to_thread("room-1", message("second"));
        assert!(!cache.needs_thread("room-1"));
        assert_eq!(cache.thread("room-1").unwrap().len(), 2);
    }
}
