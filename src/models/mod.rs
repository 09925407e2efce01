pub mod chat_room;
pub mod message;
pub mod user;
