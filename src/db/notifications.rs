use chrono::NaiveDateTime;
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{NewNotification, Notification};
use crate::response::PageRequest;

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, notification_type, reference_id, \
     reference_type, read_at, created_at";

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub since: Option<NaiveDateTime>,
}

/// Takes a connection so callers can write the notification in the same
/// transaction as the event it reports.
#[instrument(skip(conn, notification), fields(user_id = notification.user_id, kind = %notification.notification_type))]
pub async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: &NewNotification,
) -> Result<i64, AppError> {
    info!("Creating notification");
    let result = sqlx::query(
        "INSERT INTO notifications
            (user_id, title, body, notification_type, reference_id, reference_type)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(notification.user_id)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.notification_type.as_str())
    .bind(notification.reference_id)
    .bind(notification.reference_type)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Stand-alone notification for events that are not written in a
/// transaction of their own.
pub async fn notify(pool: &Pool<Sqlite>, notification: &NewNotification) -> Result<i64, AppError> {
    let mut conn = pool.acquire().await?;
    insert_notification(&mut conn, notification).await
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, user_id: i64, filter: &NotificationFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if filter.unread_only {
        qb.push(" AND read_at IS NULL");
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at > ").push_bind(since);
    }
}

#[instrument(skip(pool))]
pub async fn list_notifications(
    pool: &Pool<Sqlite>,
    user_id: i64,
    filter: &NotificationFilter,
    page: &PageRequest,
) -> Result<(Vec<Notification>, i64), AppError> {
    info!("Listing notifications");
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM notifications");
    push_filters(&mut count, user_id, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM notifications",
        NOTIFICATION_COLUMNS
    ));
    push_filters(&mut query, user_id, filter);
    query
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = query.build_query_as::<Notification>().fetch_all(pool).await?;
    Ok((rows, total))
}

#[instrument(skip(pool))]
pub async fn get_notification(pool: &Pool<Sqlite>, id: i64) -> Result<Notification, AppError> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {} FROM notifications WHERE id = ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}

#[instrument(skip(pool))]
pub async fn count_unread_notifications(pool: &Pool<Sqlite>, user_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Idempotent; an already-read notification keeps its original `read_at`.
#[instrument(skip(pool))]
pub async fn mark_notification_read(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE notifications SET read_at = COALESCE(read_at, CURRENT_TIMESTAMP) WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn mark_all_notifications_read(pool: &Pool<Sqlite>, user_id: i64) -> Result<u64, AppError> {
    info!("Marking all notifications read");
    let result = sqlx::query(
        "UPDATE notifications SET read_at = CURRENT_TIMESTAMP WHERE user_id = ? AND read_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[instrument(skip(pool))]
pub async fn delete_notification(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM notifications WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
