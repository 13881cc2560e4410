use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::policy::{may_message, require, require_visible};
use crate::auth::{Access, Permission, Resource, User};
use crate::db::messages::{
    MessageFilter, count_unread_messages, get_message, list_messages, mark_conversation_read,
    mark_message_read, messages_involving, redact_message, send_message,
};
use crate::db::users::get_user;
use crate::error::AppError;
use crate::messaging::{group_conversations, prepare_content};
use crate::models::{
    Conversation, Message, MessageType, NewMessage, NewNotification, NotificationType, preview,
};
use crate::response::{ApiResult, PageRequest, created, message_only, ok, paginated};
use crate::validation::{JsonBody, JsonValidateExt};

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        conversations,
        unread_count,
        show,
        send,
        mark_read,
        mark_conversation,
        redact
    ]
}

#[derive(FromForm)]
pub struct MessagesQuery {
    page: Option<i64>,
    limit: Option<i64>,
    conversation_with: Option<i64>,
    unread_only: Option<bool>,
    #[field(name = "type")]
    message_type: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub subject: Option<String>,
    pub content: String,
    pub message_type: Option<MessageType>,
    pub parent_message_id: Option<i64>,
}

#[derive(Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

async fn load_visible(db: &Pool<Sqlite>, user: &User, id: i64) -> Result<Message, AppError> {
    let message = get_message(db, id).await?;
    require_visible(db, user, Resource::from(&message), Access::Read, "Message").await?;
    Ok(message)
}

#[get("/?<q..>")]
pub async fn list(q: MessagesQuery, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Message>> {
    let page = PageRequest::new(q.page, q.limit);
    let filter = MessageFilter {
        conversation_with: q.conversation_with,
        unread_only: q.unread_only.unwrap_or(false),
        message_type: q.message_type.as_deref().map(str::parse).transpose()?,
    };

    let (messages, total) = list_messages(db, user.id, &filter, &page).await?;
    paginated(messages, &page, total)
}

#[get("/conversations")]
pub async fn conversations(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Conversation>> {
    let messages = messages_involving(db, user.id).await?;
    ok(group_conversations(user.id, messages))
}

#[get("/unread/count")]
pub async fn unread_count(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<UnreadCount> {
    ok(UnreadCount {
        count: count_unread_messages(db, user.id).await?,
    })
}

/// Opening a message addressed to the caller marks it read.
#[get("/<id>")]
pub async fn show(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Message> {
    let message = load_visible(db, &user, id).await?;
    if message.recipient_id == user.id && message.read_at.is_none() {
        mark_message_read(db, message.id).await?;
        return ok(get_message(db, message.id).await?);
    }
    ok(message)
}

#[post("/", data = "<body>")]
pub async fn send(
    body: JsonBody<'_, SendMessageRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Message> {
    user.require_permission(Permission::SendMessages)?;
    let request = body.validated()?;

    let content = prepare_content(&request.content)?;
    if request.recipient_id == user.id {
        return Err(AppError::Validation(
            "You cannot send a message to yourself".to_string(),
        ));
    }

    let recipient = match get_user(db, request.recipient_id).await {
        Ok(recipient) if recipient.is_active() => recipient,
        Ok(_) | Err(AppError::NotFound(_)) => {
            return Err(AppError::Validation(
                "recipient_id: recipient not found or inactive".to_string(),
            ));
        }
        Err(err) => return Err(err),
    };

    if !may_message(db, &user, &recipient).await? {
        return Err(AppError::Authorization(
            "You can only message users you have a coaching relationship with".to_string(),
        ));
    }

    if let Some(parent_id) = request.parent_message_id {
        let parent = get_message(db, parent_id).await.map_err(|err| match err {
            AppError::NotFound(_) => {
                AppError::Validation("parent_message_id: message not found".to_string())
            }
            other => other,
        })?;
        let in_thread = [parent.sender_id, parent.recipient_id];
        if !in_thread.contains(&user.id) || !in_thread.contains(&recipient.id) {
            return Err(AppError::Validation(
                "parent_message_id: message belongs to another conversation".to_string(),
            ));
        }
    }

    let notification = NewNotification {
        user_id: recipient.id,
        title: format!("New message from {}", user.name),
        body: preview(&content),
        notification_type: NotificationType::Message,
        reference_id: None,
        reference_type: Some("message"),
    };

    let id = send_message(
        db,
        &NewMessage {
            sender_id: user.id,
            recipient_id: recipient.id,
            subject: request.subject,
            content,
            message_type: request.message_type.unwrap_or(MessageType::Text),
            parent_message_id: request.parent_message_id,
        },
        notification,
    )
    .await?;

    created(get_message(db, id).await?, "Message sent successfully")
}

#[put("/<id>/read")]
pub async fn mark_read(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let message = load_visible(db, &user, id).await?;
    if message.recipient_id != user.id {
        return Err(AppError::Authorization(
            "Only the recipient can mark a message as read".to_string(),
        ));
    }

    mark_message_read(db, message.id).await?;
    message_only("Message marked as read")
}

#[put("/conversation/<user_id>/read")]
pub async fn mark_conversation(
    user_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<MarkedRead> {
    let updated = mark_conversation_read(db, user.id, user_id).await?;
    ok(MarkedRead { updated })
}

/// Only the sender (or an admin) may delete; the content is redacted and the
/// row stays in the thread.
#[delete("/<id>")]
pub async fn redact(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let message = load_visible(db, &user, id).await?;
    require(db, &user, Resource::from(&message), Access::Write).await?;

    redact_message(db, message.id).await?;
    message_only("Message deleted successfully")
}
