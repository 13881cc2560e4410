use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::db::notifications::insert_notification;
use crate::error::AppError;
use crate::models::{DELETED_MESSAGE_CONTENT, Message, MessageType, NewMessage, NewNotification};
use crate::response::PageRequest;

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.sender_id, s.name AS sender_name, m.recipient_id, r.name AS recipient_name,
           m.subject, m.content, m.message_type, m.parent_message_id, m.read_at, m.deleted,
           m.created_at
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.recipient_id";

#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub conversation_with: Option<i64>,
    pub unread_only: bool,
    pub message_type: Option<MessageType>,
}

#[instrument(skip(pool))]
pub async fn get_message(pool: &Pool<Sqlite>, id: i64) -> Result<Message, AppError> {
    sqlx::query_as::<_, Message>(&format!("{} WHERE m.id = ?", MESSAGE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, viewer_id: i64, filter: &MessageFilter) {
    qb.push(" WHERE (m.sender_id = ")
        .push_bind(viewer_id)
        .push(" OR m.recipient_id = ")
        .push_bind(viewer_id)
        .push(")");

    if let Some(other) = filter.conversation_with {
        qb.push(" AND (m.sender_id = ")
            .push_bind(other)
            .push(" OR m.recipient_id = ")
            .push_bind(other)
            .push(")");
    }
    if filter.unread_only {
        qb.push(" AND m.recipient_id = ")
            .push_bind(viewer_id)
            .push(" AND m.read_at IS NULL");
    }
    if let Some(message_type) = filter.message_type {
        qb.push(" AND m.message_type = ").push_bind(message_type.as_str());
    }
}

/// Messages sent or received by `viewer_id`, newest first.
#[instrument(skip(pool))]
pub async fn list_messages(
    pool: &Pool<Sqlite>,
    viewer_id: i64,
    filter: &MessageFilter,
    page: &PageRequest,
) -> Result<(Vec<Message>, i64), AppError> {
    info!("Listing messages");
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM messages m");
    push_filters(&mut count, viewer_id, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(MESSAGE_SELECT);
    push_filters(&mut query, viewer_id, filter);
    query
        .push(" ORDER BY m.created_at DESC, m.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = query.build_query_as::<Message>().fetch_all(pool).await?;
    Ok((rows, total))
}

/// Every message the user took part in; input for conversation grouping.
#[instrument(skip(pool))]
pub async fn messages_involving(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Message>, AppError> {
    let rows = sqlx::query_as::<_, Message>(&format!(
        "{} WHERE m.sender_id = ?1 OR m.recipient_id = ?1 ORDER BY m.created_at DESC, m.id DESC",
        MESSAGE_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Stores the message and the recipient's notification atomically.
#[instrument(skip(pool, message, notification), fields(sender_id = message.sender_id, recipient_id = message.recipient_id))]
pub async fn send_message(
    pool: &Pool<Sqlite>,
    message: &NewMessage,
    mut notification: NewNotification,
) -> Result<i64, AppError> {
    info!("Sending message");
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        "INSERT INTO messages
            (sender_id, recipient_id, subject, content, message_type, parent_message_id)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(message.sender_id)
    .bind(message.recipient_id)
    .bind(&message.subject)
    .bind(&message.content)
    .bind(message.message_type.as_str())
    .bind(message.parent_message_id)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    notification.reference_id = Some(id);
    insert_notification(&mut tx, &notification).await?;

    tx.commit().await?;
    Ok(id)
}

#[instrument(skip(pool))]
pub async fn mark_message_read(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE messages SET read_at = COALESCE(read_at, CURRENT_TIMESTAMP) WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Marks everything `other_id` sent to `viewer_id` as read.
#[instrument(skip(pool))]
pub async fn mark_conversation_read(
    pool: &Pool<Sqlite>,
    viewer_id: i64,
    other_id: i64,
) -> Result<u64, AppError> {
    info!("Marking conversation read");
    let result = sqlx::query(
        "UPDATE messages SET read_at = CURRENT_TIMESTAMP
         WHERE recipient_id = ? AND sender_id = ? AND read_at IS NULL",
    )
    .bind(viewer_id)
    .bind(other_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Deletion keeps the row so conversations stay intact.
#[instrument(skip(pool))]
pub async fn redact_message(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Redacting message");
    sqlx::query("UPDATE messages SET content = ?, deleted = 1 WHERE id = ?")
        .bind(DELETED_MESSAGE_CONTENT)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn count_unread_messages(pool: &Pool<Sqlite>, user_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE recipient_id = ? AND read_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
