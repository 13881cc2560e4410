use rocket::State;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::notifications::{
    NotificationFilter, count_unread_notifications, delete_notification, get_notification,
    list_notifications, mark_all_notifications_read, mark_notification_read,
};
use crate::error::AppError;
use crate::models::Notification;
use crate::response::{ApiResult, PageRequest, message_only, ok, ok_with_message, paginated};
use crate::validation::parse_datetime;

pub fn routes() -> Vec<rocket::Route> {
    routes![list, unread_count, mark_read, mark_all_read, remove]
}

#[derive(FromForm)]
pub struct NotificationsQuery {
    page: Option<i64>,
    limit: Option<i64>,
    unread_only: Option<bool>,
    /// Only notifications created after this instant, for polling clients.
    since: Option<String>,
}

#[derive(Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// Notifications are private to their owner; admins get no override here.
async fn load_owned(db: &Pool<Sqlite>, user: &User, id: i64) -> Result<Notification, AppError> {
    let notification = get_notification(db, id).await?;
    if notification.user_id != user.id {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(notification)
}

#[get("/?<q..>")]
pub async fn list(
    q: NotificationsQuery,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Notification>> {
    let page = PageRequest::new(q.page, q.limit);
    let filter = NotificationFilter {
        unread_only: q.unread_only.unwrap_or(false),
        since: q
            .since
            .as_deref()
            .map(|value| parse_datetime("since", value))
            .transpose()?,
    };

    let (notifications, total) = list_notifications(db, user.id, &filter, &page).await?;
    paginated(notifications, &page, total)
}

#[get("/unread-count")]
pub async fn unread_count(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<UnreadCount> {
    ok(UnreadCount {
        count: count_unread_notifications(db, user.id).await?,
    })
}

#[put("/<id>/read")]
pub async fn mark_read(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let notification = load_owned(db, &user, id).await?;
    mark_notification_read(db, notification.id).await?;
    message_only("Notification marked as read")
}

#[put("/read-all")]
pub async fn mark_all_read(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<MarkedRead> {
    let updated = mark_all_notifications_read(db, user.id).await?;
    ok_with_message(MarkedRead { updated }, "All notifications marked as read")
}

#[delete("/<id>")]
pub async fn remove(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let notification = load_owned(db, &user, id).await?;
    delete_notification(db, notification.id).await?;
    message_only("Notification deleted successfully")
}
