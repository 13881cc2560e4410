use chrono::NaiveDateTime;
use serde::Serialize;

use super::{string_enum, utc};

pub const DELETED_MESSAGE_CONTENT: &str = "[Message deleted]";
pub const MAX_MESSAGE_LENGTH: usize = 5000;

string_enum! {
    MessageType("message type") {
        Text => "text",
        Image => "image",
        File => "file",
        System => "system",
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub recipient_id: i64,
    pub recipient_name: String,
    pub subject: Option<String>,
    pub content: String,
    #[sqlx(try_from = "String")]
    pub message_type: MessageType,
    pub parent_message_id: Option<i64>,
    #[serde(serialize_with = "utc::option::serialize")]
    pub read_at: Option<NaiveDateTime>,
    pub deleted: bool,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub parent_message_id: Option<i64>,
}

/// One entry per unordered pair of participants.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub participant_ids: (i64, i64),
    pub other_user_id: i64,
    pub other_user_name: String,
    pub last_message: Message,
    pub unread_count: i64,
    pub message_count: i64,
}
