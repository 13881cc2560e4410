use chrono::NaiveDate;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::auth::{Role, User};
use crate::error::AppError;
use crate::models::{
    NewWorkout, NewWorkoutExercise, Workout, WorkoutChanges, WorkoutExercise,
    WorkoutExerciseChanges, WorkoutStatus,
};
use crate::response::PageRequest;

const WORKOUT_SELECT: &str = "
    SELECT w.id, w.program_id, p.name AS program_name, p.coach_id AS program_coach_id,
           w.client_id, c.name AS client_name, w.created_by, w.name, w.description,
           w.scheduled_date, w.duration_minutes, w.status, w.notes, w.completion_rating,
           w.calories_burned, w.completed_at, w.created_at
    FROM workouts w
    LEFT JOIN programs p ON p.id = w.program_id
    LEFT JOIN users c ON c.id = w.client_id";

const WORKOUT_EXERCISE_SELECT: &str = "
    SELECT we.id, we.workout_id, we.exercise_id, e.name AS exercise_name, e.category,
           we.order_index, we.sets, we.reps, we.weight, we.duration_seconds,
           we.rest_seconds, we.notes, we.completed
    FROM workout_exercises we
    JOIN exercises e ON e.id = we.exercise_id";

#[derive(Debug, Clone, Default)]
pub struct WorkoutFilter {
    pub client_id: Option<i64>,
    pub program_id: Option<i64>,
    pub status: Option<WorkoutStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[instrument(skip(pool))]
pub async fn get_workout(pool: &Pool<Sqlite>, id: i64) -> Result<Workout, AppError> {
    info!("Fetching workout");
    sqlx::query_as::<_, Workout>(&format!("{} WHERE w.id = ?", WORKOUT_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Workout not found".to_string()))
}

fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, viewer: &User, filter: &WorkoutFilter) {
    qb.push(" WHERE 1 = 1");
    match viewer.role {
        Role::Admin => {}
        Role::Client => {
            qb.push(" AND w.client_id = ").push_bind(viewer.id);
        }
        Role::Coach => {
            qb.push(" AND (w.created_by = ")
                .push_bind(viewer.id)
                .push(" OR p.coach_id = ")
                .push_bind(viewer.id)
                .push(" OR EXISTS (SELECT 1 FROM programs lp WHERE lp.client_id = w.client_id AND lp.coach_id = ")
                .push_bind(viewer.id)
                .push(") OR EXISTS (SELECT 1 FROM appointments la WHERE la.client_id = w.client_id AND la.coach_id = ")
                .push_bind(viewer.id)
                .push(") OR EXISTS (SELECT 1 FROM users lu WHERE lu.id = w.client_id AND lu.coach_id = ")
                .push_bind(viewer.id)
                .push("))");
        }
    }
    if let Some(client_id) = filter.client_id {
        qb.push(" AND w.client_id = ").push_bind(client_id);
    }
    if let Some(program_id) = filter.program_id {
        qb.push(" AND w.program_id = ").push_bind(program_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND w.status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.from {
        qb.push(" AND w.scheduled_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND w.scheduled_date <= ").push_bind(to);
    }
}

#[instrument(skip(pool, viewer), fields(viewer_id = viewer.id))]
pub async fn list_workouts(
    pool: &Pool<Sqlite>,
    viewer: &User,
    filter: &WorkoutFilter,
    page: &PageRequest,
) -> Result<(Vec<Workout>, i64), AppError> {
    info!("Listing workouts");
    let mut count = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM workouts w LEFT JOIN programs p ON p.id = w.program_id",
    );
    push_scope(&mut count, viewer, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(WORKOUT_SELECT);
    push_scope(&mut query, viewer, filter);
    query
        .push(" ORDER BY w.scheduled_date DESC, w.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let workouts = query.build_query_as::<Workout>().fetch_all(pool).await?;
    Ok((workouts, total))
}

/// Inserts the workout and its exercises, numbered from 1 in the given order.
#[instrument(skip(pool, workout, exercises), fields(client_id = workout.client_id, exercises = exercises.len()))]
pub async fn create_workout(
    pool: &Pool<Sqlite>,
    workout: &NewWorkout,
    exercises: &[NewWorkoutExercise],
) -> Result<i64, AppError> {
    info!("Creating workout");
    let mut tx = pool.begin().await?;

    let workout_id = sqlx::query(
        "INSERT INTO workouts
            (program_id, client_id, created_by, name, description, scheduled_date,
             duration_minutes, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(workout.program_id)
    .bind(workout.client_id)
    .bind(workout.created_by)
    .bind(&workout.name)
    .bind(&workout.description)
    .bind(workout.scheduled_date)
    .bind(workout.duration_minutes)
    .bind(&workout.notes)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for (index, exercise) in exercises.iter().enumerate() {
        insert_workout_exercise(&mut tx, workout_id, index as i64 + 1, exercise).await?;
    }

    tx.commit().await?;
    Ok(workout_id)
}

async fn insert_workout_exercise(
    conn: &mut sqlx::SqliteConnection,
    workout_id: i64,
    order_index: i64,
    exercise: &NewWorkoutExercise,
) -> Result<i64, AppError> {
    let result = sqlx::query(
        "INSERT INTO workout_exercises
            (workout_id, exercise_id, order_index, sets, reps, weight, duration_seconds,
             rest_seconds, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(workout_id)
    .bind(exercise.exercise_id)
    .bind(order_index)
    .bind(exercise.sets)
    .bind(exercise.reps)
    .bind(exercise.weight)
    .bind(exercise.duration_seconds)
    .bind(exercise.rest_seconds)
    .bind(&exercise.notes)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

#[instrument(skip(pool, changes))]
pub async fn update_workout(
    pool: &Pool<Sqlite>,
    id: i64,
    changes: &WorkoutChanges,
) -> Result<(), AppError> {
    info!("Updating workout");
    let status = changes.status.map(|s| s.as_str());

    sqlx::query(
        "UPDATE workouts SET
            name = COALESCE(?1, name),
            description = COALESCE(?2, description),
            scheduled_date = COALESCE(?3, scheduled_date),
            duration_minutes = COALESCE(?4, duration_minutes),
            status = COALESCE(?5, status),
            notes = COALESCE(?6, notes),
            completion_rating = COALESCE(?7, completion_rating),
            calories_burned = COALESCE(?8, calories_burned),
            completed_at = CASE
                WHEN ?5 = 'completed' THEN COALESCE(completed_at, CURRENT_TIMESTAMP)
                ELSE completed_at
            END,
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?9",
    )
    .bind(&changes.name)
    .bind(&changes.description)
    .bind(changes.scheduled_date)
    .bind(changes.duration_minutes)
    .bind(status)
    .bind(&changes.notes)
    .bind(changes.completion_rating)
    .bind(changes.calories_burned)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_workout(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting workout");
    sqlx::query("DELETE FROM workouts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn list_workout_exercises(
    pool: &Pool<Sqlite>,
    workout_id: i64,
) -> Result<Vec<WorkoutExercise>, AppError> {
    let rows = sqlx::query_as::<_, WorkoutExercise>(&format!(
        "{} WHERE we.workout_id = ? ORDER BY we.order_index",
        WORKOUT_EXERCISE_SELECT
    ))
    .bind(workout_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Appends an exercise after the workout's current last entry.
#[instrument(skip(pool, exercise))]
pub async fn add_workout_exercise(
    pool: &Pool<Sqlite>,
    workout_id: i64,
    exercise: &NewWorkoutExercise,
) -> Result<WorkoutExercise, AppError> {
    info!("Adding exercise to workout");
    let mut tx = pool.begin().await?;

    let next_index: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(order_index), 0) + 1 FROM workout_exercises WHERE workout_id = ?",
    )
    .bind(workout_id)
    .fetch_one(&mut *tx)
    .await?;

    let id = insert_workout_exercise(&mut tx, workout_id, next_index, exercise).await?;

    let row = sqlx::query_as::<_, WorkoutExercise>(&format!(
        "{} WHERE we.id = ?",
        WORKOUT_EXERCISE_SELECT
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

#[instrument(skip(pool, changes))]
pub async fn update_workout_exercise(
    pool: &Pool<Sqlite>,
    workout_id: i64,
    id: i64,
    changes: &WorkoutExerciseChanges,
) -> Result<WorkoutExercise, AppError> {
    info!("Updating workout exercise");
    let result = sqlx::query(
        "UPDATE workout_exercises SET
            sets = COALESCE(?, sets),
            reps = COALESCE(?, reps),
            weight = COALESCE(?, weight),
            duration_seconds = COALESCE(?, duration_seconds),
            rest_seconds = COALESCE(?, rest_seconds),
            notes = COALESCE(?, notes),
            completed = COALESCE(?, completed)
         WHERE id = ? AND workout_id = ?",
    )
    .bind(changes.sets)
    .bind(changes.reps)
    .bind(changes.weight)
    .bind(changes.duration_seconds)
    .bind(changes.rest_seconds)
    .bind(&changes.notes)
    .bind(changes.completed)
    .bind(id)
    .bind(workout_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Workout exercise not found".to_string()));
    }

    let row = sqlx::query_as::<_, WorkoutExercise>(&format!(
        "{} WHERE we.id = ?",
        WORKOUT_EXERCISE_SELECT
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
