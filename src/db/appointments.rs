use chrono::{Duration, NaiveDate, NaiveDateTime};
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::auth::{Role, User};
use crate::db::notifications::insert_notification;
use crate::error::AppError;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentUpdate, NewAppointment, NewNotification,
};
use crate::response::PageRequest;
use crate::scheduling::{TimeRange, first_conflict};

const APPOINTMENT_SELECT: &str = "
    SELECT a.id, a.coach_id, coach.name AS coach_name, a.client_id, client.name AS client_name,
           a.title, a.appointment_type, a.scheduled_at, a.duration_minutes, a.ends_at,
           a.status, a.location, a.notes, a.created_at
    FROM appointments a
    JOIN users coach ON coach.id = a.coach_id
    JOIN users client ON client.id = a.client_id";

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub coach_id: Option<i64>,
    pub client_id: Option<i64>,
    pub upcoming_only: bool,
}

#[instrument(skip(pool))]
pub async fn get_appointment(pool: &Pool<Sqlite>, id: i64) -> Result<Appointment, AppError> {
    info!("Fetching appointment");
    sqlx::query_as::<_, Appointment>(&format!("{} WHERE a.id = ?", APPOINTMENT_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))
}

fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, viewer: &User, filter: &AppointmentFilter) {
    qb.push(" WHERE 1 = 1");
    match viewer.role {
        Role::Admin => {}
        Role::Coach => {
            qb.push(" AND a.coach_id = ").push_bind(viewer.id);
        }
        Role::Client => {
            qb.push(" AND a.client_id = ").push_bind(viewer.id);
        }
    }
    match filter.status {
        Some(status) => {
            qb.push(" AND a.status = ").push_bind(status.as_str());
        }
        None => {
            qb.push(" AND a.status != 'cancelled'");
        }
    }
    if let Some(date) = filter.date {
        let start = date.and_time(chrono::NaiveTime::MIN);
        qb.push(" AND a.scheduled_at >= ")
            .push_bind(start)
            .push(" AND a.scheduled_at < ")
            .push_bind(start + Duration::days(1));
    }
    if let Some(coach_id) = filter.coach_id {
        qb.push(" AND a.coach_id = ").push_bind(coach_id);
    }
    if let Some(client_id) = filter.client_id {
        qb.push(" AND a.client_id = ").push_bind(client_id);
    }
    if filter.upcoming_only {
        qb.push(" AND a.status IN ('scheduled', 'confirmed') AND a.scheduled_at >= ")
            .push_bind(now());
    }
}

#[instrument(skip(pool, viewer), fields(viewer_id = viewer.id))]
pub async fn list_appointments(
    pool: &Pool<Sqlite>,
    viewer: &User,
    filter: &AppointmentFilter,
    page: &PageRequest,
) -> Result<(Vec<Appointment>, i64), AppError> {
    info!("Listing appointments");
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM appointments a");
    push_scope(&mut count, viewer, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(APPOINTMENT_SELECT);
    push_scope(&mut query, viewer, filter);
    query
        .push(" ORDER BY a.scheduled_at, a.id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = query.build_query_as::<Appointment>().fetch_all(pool).await?;
    Ok((rows, total))
}

/// Calendar ranges of the coach's non-cancelled appointments that touch
/// `window`.
async fn busy_ranges(
    conn: &mut SqliteConnection,
    coach_id: i64,
    window: &TimeRange,
    exclude_id: Option<i64>,
) -> Result<Vec<TimeRange>, AppError> {
    let rows: Vec<(NaiveDateTime, NaiveDateTime)> = sqlx::query_as(
        "SELECT scheduled_at, ends_at FROM appointments
         WHERE coach_id = ? AND status != 'cancelled'
           AND scheduled_at < ? AND ends_at > ?
           AND id != COALESCE(?, -1)",
    )
    .bind(coach_id)
    .bind(window.end)
    .bind(window.start)
    .bind(exclude_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(start, end)| TimeRange::new(start, end))
        .collect())
}

#[instrument(skip(pool))]
pub async fn coach_busy_ranges(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    window: TimeRange,
) -> Result<Vec<TimeRange>, AppError> {
    let mut conn = pool.acquire().await?;
    busy_ranges(&mut conn, coach_id, &window, None).await
}

fn conflict(coach_id: i64, proposed: &TimeRange, existing: &TimeRange) -> AppError {
    warn!(
        coach_id,
        proposed_start = %proposed.start,
        existing_start = %existing.start,
        existing_end = %existing.end,
        "Appointment overlaps an existing booking"
    );
    AppError::Conflict("The coach already has an appointment in this time range".to_string())
}

/// Checks the coach's calendar and inserts inside one transaction. The
/// schema's overlap trigger rejects anything that slips past the check.
#[instrument(skip(pool, appointment, notify), fields(coach_id = appointment.coach_id, client_id = appointment.client_id))]
pub async fn create_appointment(
    pool: &Pool<Sqlite>,
    appointment: &NewAppointment,
    notify: Option<NewNotification>,
) -> Result<i64, AppError> {
    info!("Booking appointment");
    let proposed = TimeRange::from_duration(appointment.scheduled_at, appointment.duration_minutes);

    let mut tx = pool.begin().await?;

    let busy = busy_ranges(&mut tx, appointment.coach_id, &proposed, None).await?;
    if let Some(existing) = first_conflict(&busy, &proposed) {
        return Err(conflict(appointment.coach_id, &proposed, existing));
    }

    let id = sqlx::query(
        "INSERT INTO appointments
            (coach_id, client_id, title, appointment_type, scheduled_at, duration_minutes,
             ends_at, status, location, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, 'scheduled', ?, ?)",
    )
    .bind(appointment.coach_id)
    .bind(appointment.client_id)
    .bind(&appointment.title)
    .bind(appointment.appointment_type.as_str())
    .bind(proposed.start)
    .bind(appointment.duration_minutes)
    .bind(proposed.end)
    .bind(&appointment.location)
    .bind(&appointment.notes)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    if let Some(mut notification) = notify {
        notification.reference_id = Some(id);
        insert_notification(&mut tx, &notification).await?;
    }

    tx.commit().await?;
    Ok(id)
}

/// Writes the resolved appointment state. When the result still occupies the
/// calendar it is re-checked against every other booking of the coach.
#[instrument(skip(pool, update, notify))]
pub async fn update_appointment(
    pool: &Pool<Sqlite>,
    id: i64,
    coach_id: i64,
    update: &AppointmentUpdate,
    notify: Option<NewNotification>,
) -> Result<(), AppError> {
    info!("Updating appointment");
    let proposed = TimeRange::from_duration(update.scheduled_at, update.duration_minutes);

    let mut tx = pool.begin().await?;

    if update.status.blocks_calendar() {
        let busy = busy_ranges(&mut tx, coach_id, &proposed, Some(id)).await?;
        if let Some(existing) = first_conflict(&busy, &proposed) {
            return Err(conflict(coach_id, &proposed, existing));
        }
    }

    sqlx::query(
        "UPDATE appointments SET
            title = ?, appointment_type = ?, scheduled_at = ?, duration_minutes = ?,
            ends_at = ?, status = ?, location = ?, notes = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(&update.title)
    .bind(update.appointment_type.as_str())
    .bind(proposed.start)
    .bind(update.duration_minutes)
    .bind(proposed.end)
    .bind(update.status.as_str())
    .bind(&update.location)
    .bind(&update.notes)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(notification) = notify {
        insert_notification(&mut tx, &notification).await?;
    }

    tx.commit().await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn cancel_appointment(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Cancelling appointment");
    sqlx::query(
        "UPDATE appointments SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Confirmed appointments whose end has passed become completed.
#[instrument(skip(pool))]
pub async fn complete_elapsed_appointments(
    pool: &Pool<Sqlite>,
    now: NaiveDateTime,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE appointments SET status = 'completed', updated_at = CURRENT_TIMESTAMP
         WHERE status = 'confirmed' AND ends_at <= ?",
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub fn now() -> NaiveDateTime {
    use chrono::SubsecRound;
    chrono::Utc::now().naive_utc().trunc_subsecs(0)
}
