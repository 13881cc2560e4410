use std::collections::HashMap;

use crate::error::AppError;
use crate::models::{Conversation, MAX_MESSAGE_LENGTH, Message};

/// Unordered participant pair; `(a, b)` and `(b, a)` map to the same key.
pub fn pair_key(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

pub fn prepare_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("content must not be empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "content must be at most {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(content.to_string())
}

/// Folds `viewer`'s messages into one conversation per counterparty, newest
/// conversation first. Unread counts only include messages sent to `viewer`.
pub fn group_conversations(viewer_id: i64, messages: Vec<Message>) -> Vec<Conversation> {
    let mut groups: HashMap<(i64, i64), Conversation> = HashMap::new();

    for message in messages {
        let key = pair_key(message.sender_id, message.recipient_id);
        let unread = i64::from(message.recipient_id == viewer_id && message.read_at.is_none());

        match groups.get_mut(&key) {
            Some(conversation) => {
                conversation.unread_count += unread;
                conversation.message_count += 1;
                let latest = &conversation.last_message;
                if (message.created_at, message.id) > (latest.created_at, latest.id) {
                    conversation.last_message = message;
                }
            }
            None => {
                let (other_user_id, other_user_name) = if message.sender_id == viewer_id {
                    (message.recipient_id, message.recipient_name.clone())
                } else {
                    (message.sender_id, message.sender_name.clone())
                };
                groups.insert(
                    key,
                    Conversation {
                        participant_ids: key,
                        other_user_id,
                        other_user_name,
                        last_message: message,
                        unread_count: unread,
                        message_count: 1,
                    },
                );
            }
        }
    }

    let mut conversations: Vec<Conversation> = groups.into_values().collect();
    conversations.sort_by(|a, b| {
        (b.last_message.created_at, b.last_message.id)
            .cmp(&(a.last_message.created_at, a.last_message.id))
    });
    conversations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageType;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    fn message(id: i64, from: i64, to: i64, minute: u32, read: bool) -> Message {
        Message {
            id,
            sender_id: from,
            sender_name: format!("user{}", from),
            recipient_id: to,
            recipient_name: format!("user{}", to),
            subject: None,
            content: format!("message {}", id),
            message_type: MessageType::Text,
            parent_message_id: None,
            read_at: read.then(|| at(59)),
            deleted: false,
            created_at: at(minute),
        }
    }

    #[test]
    fn pair_key_is_unordered() {
        assert_eq!(pair_key(7, 3), pair_key(3, 7));
        assert_eq!(pair_key(3, 7), (3, 7));
    }

    #[test]
    fn both_directions_fold_into_one_conversation() {
        let messages = vec![
            message(1, 1, 2, 0, true),
            message(2, 2, 1, 5, false),
            message(3, 1, 2, 10, false),
            message(4, 2, 1, 3, false),
        ];

        let conversations = group_conversations(1, messages);
        assert_eq!(conversations.len(), 1);

        let conversation = &conversations[0];
        assert_eq!(conversation.other_user_id, 2);
        assert_eq!(conversation.last_message.id, 3);
        assert_eq!(conversation.message_count, 4);
        // Only 2 -> 1 messages count against the viewer.
        assert_eq!(conversation.unread_count, 2);
    }

    #[test]
    fn latest_conversation_first() {
        let messages = vec![
            message(1, 1, 2, 0, false),
            message(2, 3, 1, 20, false),
            message(3, 1, 4, 10, true),
        ];

        let conversations = group_conversations(1, messages);
        let order: Vec<i64> = conversations.iter().map(|c| c.other_user_id).collect();
        assert_eq!(order, vec![3, 4, 2]);
        assert_eq!(conversations[0].unread_count, 1);
        assert_eq!(conversations[2].unread_count, 0);
    }

    #[test]
    fn content_is_trimmed_and_bounded() {
        assert_eq!(prepare_content("  hi  ").unwrap(), "hi");
        assert!(prepare_content("   ").is_err());
        assert!(prepare_content(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }
}
