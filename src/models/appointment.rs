use chrono::NaiveDateTime;
use serde::Serialize;

use super::{string_enum, utc};
use crate::auth::Role;
use crate::error::AppError;

string_enum! {
    AppointmentStatus("appointment status") {
        Scheduled => "scheduled",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

string_enum! {
    AppointmentType("appointment type") {
        Consultation => "consultation",
        Training => "training",
        Nutrition => "nutrition",
        Assessment => "assessment",
    }
}

impl AppointmentStatus {
    /// Cancelled appointments release their time range.
    pub fn blocks_calendar(self) -> bool {
        self != AppointmentStatus::Cancelled
    }

    /// Coaches and admins may set any status. Clients may only confirm a
    /// scheduled appointment or cancel one that has not happened yet.
    pub fn transition_for(self, role: Role, next: AppointmentStatus) -> Result<Self, AppError> {
        use AppointmentStatus::*;

        if self == next {
            return Ok(next);
        }
        match role {
            Role::Coach | Role::Admin => Ok(next),
            Role::Client => match (self, next) {
                (Scheduled, Confirmed) | (Scheduled, Cancelled) | (Confirmed, Cancelled) => {
                    Ok(next)
                }
                _ => Err(AppError::Authorization(format!(
                    "Clients cannot move an appointment from {} to {}",
                    self, next
                ))),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: i64,
    pub coach_id: i64,
    pub coach_name: String,
    pub client_id: i64,
    pub client_name: String,
    pub title: Option<String>,
    #[sqlx(try_from = "String")]
    pub appointment_type: AppointmentType,
    #[serde(serialize_with = "utc::serialize")]
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i64,
    #[serde(serialize_with = "utc::serialize")]
    pub ends_at: NaiveDateTime,
    #[sqlx(try_from = "String")]
    pub status: AppointmentStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub coach_id: i64,
    pub client_id: i64,
    pub title: Option<String>,
    pub appointment_type: AppointmentType,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i64,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Resolved update: every field holds the value the row will have.
#[derive(Debug, Clone)]
pub struct AppointmentUpdate {
    pub title: Option<String>,
    pub appointment_type: AppointmentType,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::AppointmentStatus::*;
    use crate::auth::Role;

    #[test]
    fn clients_only_confirm_or_cancel() {
        assert!(Scheduled.transition_for(Role::Client, Confirmed).is_ok());
        assert!(Scheduled.transition_for(Role::Client, Cancelled).is_ok());
        assert!(Confirmed.transition_for(Role::Client, Cancelled).is_ok());

        assert!(Scheduled.transition_for(Role::Client, Completed).is_err());
        assert!(Confirmed.transition_for(Role::Client, NoShow).is_err());
        assert!(Cancelled.transition_for(Role::Client, Confirmed).is_err());
    }

    #[test]
    fn coaches_set_any_status() {
        assert!(Scheduled.transition_for(Role::Coach, NoShow).is_ok());
        assert!(Cancelled.transition_for(Role::Admin, Scheduled).is_ok());
        assert!(!Cancelled.blocks_calendar());
        assert!(NoShow.blocks_calendar());
    }
}
