use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::{string_enum, utc};
use crate::error::AppError;

string_enum! {
    WorkoutStatus("workout status") {
        Scheduled => "scheduled",
        InProgress => "in_progress",
        Completed => "completed",
        Skipped => "skipped",
        Cancelled => "cancelled",
    }
}

string_enum! {
    ExerciseCategory("exercise category") {
        Strength => "strength",
        Cardio => "cardio",
        Flexibility => "flexibility",
        Balance => "balance",
    }
}

impl WorkoutStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkoutStatus::Completed | WorkoutStatus::Skipped | WorkoutStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: WorkoutStatus) -> bool {
        use WorkoutStatus::*;

        if self == next {
            return true;
        }
        match self {
            Scheduled => next != Scheduled,
            InProgress => matches!(next, Completed | Skipped | Cancelled),
            Completed | Skipped | Cancelled => false,
        }
    }

    pub fn transition_to(self, next: WorkoutStatus) -> Result<WorkoutStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::Validation(format!(
                "Workout cannot move from {} to {}",
                self, next
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub category: ExerciseCategory,
    pub equipment: Option<String>,
    pub instructions: Option<String>,
    pub created_by: Option<i64>,
    pub is_public: bool,
}

impl Exercise {
    /// Public entries plus the user's own private ones.
    pub fn visible_to(&self, user_id: i64) -> bool {
        self.is_public || self.created_by == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Workout {
    pub id: i64,
    pub program_id: Option<i64>,
    pub program_name: Option<String>,
    pub program_coach_id: Option<i64>,
    pub client_id: i64,
    pub client_name: Option<String>,
    pub created_by: i64,
    pub name: String,
    pub description: Option<String>,
    pub scheduled_date: NaiveDate,
    pub duration_minutes: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: WorkoutStatus,
    pub notes: Option<String>,
    pub completion_rating: Option<i64>,
    pub calories_burned: Option<i64>,
    #[serde(serialize_with = "utc::option::serialize")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkoutExercise {
    pub id: i64,
    pub workout_id: i64,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub category: String,
    pub order_index: i64,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub weight: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub rest_seconds: Option<i64>,
    pub notes: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkoutDetail {
    #[serde(flatten)]
    pub workout: Workout,
    pub exercises: Vec<WorkoutExercise>,
}

#[derive(Debug, Clone)]
pub struct NewWorkout {
    pub program_id: Option<i64>,
    pub client_id: i64,
    pub created_by: i64,
    pub name: String,
    pub description: Option<String>,
    pub scheduled_date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub duration_minutes: Option<i64>,
    pub status: Option<WorkoutStatus>,
    pub notes: Option<String>,
    pub completion_rating: Option<i64>,
    pub calories_burned: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewWorkoutExercise {
    pub exercise_id: i64,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub weight: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub rest_seconds: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutExerciseChanges {
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub weight: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub rest_seconds: Option<i64>,
    pub notes: Option<String>,
    pub completed: Option<bool>,
}
