use chrono::NaiveDate;
use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::policy::{coach_linked_to_client, require_visible};
use crate::auth::{Access, Permission, Resource, Role, User};
use crate::config::AppConfig;
use crate::db::appointments::{
    AppointmentFilter, cancel_appointment, coach_busy_ranges, create_appointment,
    get_appointment, list_appointments, update_appointment,
};
use crate::db::notifications::notify;
use crate::db::users::get_active_user_with_role;
use crate::error::AppError;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, AppointmentUpdate, NewAppointment,
    NewNotification, NotificationType, utc,
};
use crate::response::{ApiResult, PageRequest, created, message_only, ok, ok_with_message, paginated};
use crate::scheduling::{
    DEFAULT_DURATION_MINUTES, available_slots, validate_duration, working_window,
};
use crate::validation::{JsonBody, JsonValidateExt, parse_date, parse_datetime, parse_optional_date};

pub fn routes() -> Vec<rocket::Route> {
    routes![list, slots, show, create, update, cancel]
}

#[derive(FromForm)]
pub struct AppointmentsQuery {
    page: Option<i64>,
    limit: Option<i64>,
    status: Option<String>,
    date: Option<String>,
    coach_id: Option<i64>,
    client_id: Option<i64>,
    upcoming: Option<bool>,
}

#[derive(Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    pub coach_id: Option<i64>,
    pub client_id: Option<i64>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub title: Option<String>,
    pub appointment_type: Option<AppointmentType>,
    pub scheduled_at: String,
    pub duration_minutes: Option<i64>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateAppointmentRequest {
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub title: Option<String>,
    pub appointment_type: Option<AppointmentType>,
    pub scheduled_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    fn touches_schedule(&self) -> bool {
        self.title.is_some()
            || self.appointment_type.is_some()
            || self.scheduled_at.is_some()
            || self.duration_minutes.is_some()
            || self.location.is_some()
    }
}

#[derive(Serialize)]
pub struct AvailableSlots {
    pub date: NaiveDate,
    pub coach_id: i64,
    pub duration_minutes: i64,
    pub available_slots: Vec<String>,
}

/// The party to tell about a change made by `actor`. Admin changes go to
/// the client.
fn counterparty(appointment: &Appointment, actor: &User) -> i64 {
    if actor.id == appointment.client_id {
        appointment.coach_id
    } else {
        appointment.client_id
    }
}

fn appointment_notice(
    user_id: i64,
    appointment_id: Option<i64>,
    title: &str,
    body: String,
) -> NewNotification {
    NewNotification {
        user_id,
        title: title.to_string(),
        body,
        notification_type: NotificationType::Appointment,
        reference_id: appointment_id,
        reference_type: Some("appointment"),
    }
}

async fn load_visible(db: &Pool<Sqlite>, user: &User, id: i64) -> Result<Appointment, AppError> {
    let appointment = get_appointment(db, id).await?;
    require_visible(db, user, Resource::from(&appointment), Access::Read, "Appointment").await?;
    Ok(appointment)
}

#[get("/?<q..>")]
pub async fn list(
    q: AppointmentsQuery,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Appointment>> {
    let page = PageRequest::new(q.page, q.limit);
    let filter = AppointmentFilter {
        status: q.status.as_deref().map(str::parse).transpose()?,
        date: parse_optional_date("date", q.date.as_deref())?,
        coach_id: q.coach_id,
        client_id: q.client_id,
        upcoming_only: q.upcoming.unwrap_or(false),
    };

    let (appointments, total) = list_appointments(db, &user, &filter, &page).await?;
    paginated(appointments, &page, total)
}

#[get("/available-slots?<coach_id>&<date>&<duration>")]
pub async fn slots(
    coach_id: Option<i64>,
    date: Option<String>,
    duration: Option<i64>,
    _user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<AvailableSlots> {
    let (Some(coach_id), Some(date)) = (coach_id, date) else {
        return Err(AppError::Validation(
            "coach_id and date are required".to_string(),
        ));
    };
    let date = parse_date("date", &date)?;
    let duration = validate_duration(duration.unwrap_or(DEFAULT_DURATION_MINUTES))?;

    if get_active_user_with_role(db, coach_id, Role::Coach)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Coach not found".to_string()));
    }

    let window = working_window(date, config.working_day_start, config.working_day_end)?;
    let busy = coach_busy_ranges(db, coach_id, window).await?;
    let available_slots = available_slots(&window, duration, &busy)
        .iter()
        .map(|slot| utc::format(&slot.start))
        .collect();

    ok(AvailableSlots {
        date,
        coach_id,
        duration_minutes: duration,
        available_slots,
    })
}

#[get("/<id>")]
pub async fn show(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Appointment> {
    ok(load_visible(db, &user, id).await?)
}

/// Clients book with a coach, coaches book for a client, admins name both.
#[post("/", data = "<body>")]
pub async fn create(
    body: JsonBody<'_, CreateAppointmentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Appointment> {
    user.require_permission(Permission::BookAppointments)?;
    let request = body.validated()?;

    let (coach_id, client_id) = match user.role {
        Role::Client => {
            let coach_id = request.coach_id.ok_or_else(|| {
                AppError::Validation("coach_id: is required".to_string())
            })?;
            if request.client_id.is_some_and(|id| id != user.id) {
                return Err(AppError::Authorization(
                    "Clients can only book appointments for themselves".to_string(),
                ));
            }
            (coach_id, user.id)
        }
        Role::Coach => {
            let client_id = request.client_id.ok_or_else(|| {
                AppError::Validation("client_id: is required".to_string())
            })?;
            if request.coach_id.is_some_and(|id| id != user.id) {
                return Err(AppError::Authorization(
                    "Coaches can only book appointments on their own calendar".to_string(),
                ));
            }
            (user.id, client_id)
        }
        Role::Admin => match (request.coach_id, request.client_id) {
            (Some(coach_id), Some(client_id)) => (coach_id, client_id),
            _ => {
                return Err(AppError::Validation(
                    "coach_id and client_id are required".to_string(),
                ));
            }
        },
    };

    if get_active_user_with_role(db, coach_id, Role::Coach).await?.is_none() {
        return Err(AppError::Validation(
            "coach_id: coach not found or inactive".to_string(),
        ));
    }
    if get_active_user_with_role(db, client_id, Role::Client).await?.is_none() {
        return Err(AppError::Validation(
            "client_id: client not found or inactive".to_string(),
        ));
    }
    // Coaches book only clients they already work with; a client booking is
    // what creates the link.
    if user.role == Role::Coach && !coach_linked_to_client(db, coach_id, client_id).await? {
        return Err(AppError::Authorization(
            "Coaches can only book appointments with their own clients".to_string(),
        ));
    }

    let scheduled_at = parse_datetime("scheduled_at", &request.scheduled_at)?;
    let duration_minutes =
        validate_duration(request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))?;

    let notice_to = if user.id == client_id { coach_id } else { client_id };
    let notice = appointment_notice(
        notice_to,
        None,
        "New appointment",
        format!(
            "{} booked an appointment on {}",
            user.name,
            utc::format(&scheduled_at)
        ),
    );

    let id = create_appointment(
        db,
        &NewAppointment {
            coach_id,
            client_id,
            title: request.title,
            appointment_type: request
                .appointment_type
                .unwrap_or(AppointmentType::Consultation),
            scheduled_at,
            duration_minutes,
            location: request.location,
            notes: request.notes,
        },
        Some(notice),
    )
    .await?;

    created(get_appointment(db, id).await?, "Appointment booked successfully")
}

/// Clients may confirm or cancel and edit notes. Coaches and admins may
/// reschedule and set any status; the calendar is re-checked either way.
#[put("/<id>", data = "<body>")]
pub async fn update(
    id: i64,
    body: JsonBody<'_, UpdateAppointmentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Appointment> {
    let request = body.validated()?;
    let appointment = load_visible(db, &user, id).await?;

    if !user.has_permission(Permission::ManageAppointments) && request.touches_schedule() {
        return Err(AppError::Authorization(
            "Clients may only change the status and notes of an appointment".to_string(),
        ));
    }

    let status = match request.status {
        Some(next) => appointment.status.transition_for(user.role, next)?,
        None => appointment.status,
    };

    let resolved = AppointmentUpdate {
        title: request.title.or_else(|| appointment.title.clone()),
        appointment_type: request
            .appointment_type
            .unwrap_or(appointment.appointment_type),
        scheduled_at: match request.scheduled_at.as_deref() {
            Some(value) => parse_datetime("scheduled_at", value)?,
            None => appointment.scheduled_at,
        },
        duration_minutes: match request.duration_minutes {
            Some(minutes) => validate_duration(minutes)?,
            None => appointment.duration_minutes,
        },
        status,
        location: request.location.or_else(|| appointment.location.clone()),
        notes: request.notes.or_else(|| appointment.notes.clone()),
    };

    let notice = (status != appointment.status).then(|| {
        appointment_notice(
            counterparty(&appointment, &user),
            Some(appointment.id),
            "Appointment updated",
            format!("{} marked the appointment as {}", user.name, status),
        )
    });

    update_appointment(db, appointment.id, appointment.coach_id, &resolved, notice).await?;
    ok_with_message(
        get_appointment(db, appointment.id).await?,
        "Appointment updated successfully",
    )
}

/// Deleting an appointment cancels it; the row is kept.
#[delete("/<id>")]
pub async fn cancel(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let appointment = load_visible(db, &user, id).await?;
    if appointment.status == AppointmentStatus::Cancelled {
        return message_only("Appointment already cancelled");
    }
    appointment
        .status
        .transition_for(user.role, AppointmentStatus::Cancelled)?;

    cancel_appointment(db, appointment.id).await?;
    notify(
        db,
        &appointment_notice(
            counterparty(&appointment, &user),
            Some(appointment.id),
            "Appointment cancelled",
            format!(
                "{} cancelled the appointment on {}",
                user.name,
                utc::format(&appointment.scheduled_at)
            ),
        ),
    )
    .await?;

    message_only("Appointment cancelled successfully")
}
