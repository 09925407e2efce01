use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        user_id: String,
    },
    MessageCreated {
        message_id: String,
        sender_id: String,
        receiver_id: String,
        content: String,
        created_at: String,
    },
    MessagesRead {
        room_id: String,
        reader_id: String,
    },
    PresenceChanged {
        user_id: String,
        is_online: bool,
    },
    Error {
        message: String,
    },
    Pong,
}
