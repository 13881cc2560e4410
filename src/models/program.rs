use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::{Difficulty, string_enum, utc};
use crate::error::AppError;

string_enum! {
    ProgramStatus("program status") {
        Draft => "draft",
        Active => "active",
        Completed => "completed",
        Paused => "paused",
    }
}

string_enum! {
    ProgramType("program type") {
        Strength => "strength",
        Cardio => "cardio",
        Flexibility => "flexibility",
        Mixed => "mixed",
    }
}

impl ProgramStatus {
    /// `draft -> active -> completed`, with `active <-> paused`. Completed
    /// programs are frozen. Re-applying the current status is allowed.
    pub fn can_transition_to(self, next: ProgramStatus) -> bool {
        use ProgramStatus::*;

        self == next
            || matches!(
                (self, next),
                (Draft, Active) | (Active, Paused) | (Active, Completed) | (Paused, Active) | (Paused, Completed)
            )
    }

    pub fn transition_to(self, next: ProgramStatus) -> Result<ProgramStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::Validation(format!(
                "Program cannot move from {} to {}",
                self, next
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Program {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub coach_id: i64,
    pub coach_name: Option<String>,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub program_type: ProgramType,
    #[sqlx(try_from = "String")]
    pub status: ProgramStatus,
    pub difficulty: Option<String>,
    pub duration_weeks: Option<i64>,
    pub sessions_per_week: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub workout_count: i64,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc::serialize")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewProgram {
    pub name: String,
    pub description: Option<String>,
    pub coach_id: i64,
    pub client_id: Option<i64>,
    pub program_type: ProgramType,
    pub difficulty: Option<Difficulty>,
    pub duration_weeks: Option<i64>,
    pub sessions_per_week: Option<i64>,
    pub status: ProgramStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProgramChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub program_type: Option<ProgramType>,
    pub difficulty: Option<Difficulty>,
    pub duration_weeks: Option<i64>,
    pub sessions_per_week: Option<i64>,
    pub status: Option<ProgramStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
