use chrono::NaiveDateTime;
use serde::Serialize;

use super::{string_enum, utc};

string_enum! {
    NotificationType("notification type") {
        Appointment => "appointment",
        Workout => "workout",
        Message => "message",
        Program => "program",
        System => "system",
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub notification_type: NotificationType,
    pub reference_id: Option<i64>,
    pub reference_type: Option<String>,
    #[serde(serialize_with = "utc::option::serialize")]
    pub read_at: Option<NaiveDateTime>,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
}

/// A notification waiting to be written, usually alongside the event that
/// caused it.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub notification_type: NotificationType,
    pub reference_id: Option<i64>,
    pub reference_type: Option<&'static str>,
}

const PREVIEW_LEN: usize = 100;

/// Truncates message content for a notification body, on a char boundary.
pub fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_LEN {
        content.to_string()
    } else {
        let cut: String = content.chars().take(PREVIEW_LEN).collect();
        format!("{}...", cut)
    }
}
