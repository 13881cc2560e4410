use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Exercise, ExerciseCategory};

const EXERCISE_COLUMNS: &str =
    "id, name, description, category, equipment, instructions, created_by, is_public";

#[derive(Debug, Clone)]
pub struct NewExercise {
    pub name: String,
    pub description: Option<String>,
    pub category: ExerciseCategory,
    pub equipment: Option<String>,
    pub instructions: Option<String>,
    pub created_by: i64,
    pub is_public: bool,
}

/// Public exercises plus the viewer's private ones. `None` lists everything.
#[instrument(skip(pool))]
pub async fn list_exercises(
    pool: &Pool<Sqlite>,
    visible_to: Option<i64>,
    category: Option<ExerciseCategory>,
    search: Option<&str>,
) -> Result<Vec<Exercise>, AppError> {
    info!("Listing exercises");
    let mut query =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM exercises WHERE 1 = 1", EXERCISE_COLUMNS));

    if let Some(user_id) = visible_to {
        query
            .push(" AND (is_public = 1 OR created_by = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(category) = category {
        query.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        query.push(" AND name LIKE ").push_bind(format!("%{}%", search));
    }
    query.push(" ORDER BY name, id");

    Ok(query.build_query_as::<Exercise>().fetch_all(pool).await?)
}

#[instrument(skip(pool))]
pub async fn get_exercise(pool: &Pool<Sqlite>, id: i64) -> Result<Exercise, AppError> {
    sqlx::query_as::<_, Exercise>(&format!(
        "SELECT {} FROM exercises WHERE id = ?",
        EXERCISE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Exercise not found".to_string()))
}

#[instrument(skip(pool, exercise), fields(name = %exercise.name))]
pub async fn create_exercise(pool: &Pool<Sqlite>, exercise: &NewExercise) -> Result<Exercise, AppError> {
    info!("Creating exercise");
    let id = sqlx::query(
        "INSERT INTO exercises (name, description, category, equipment, instructions, created_by, is_public)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&exercise.name)
    .bind(&exercise.description)
    .bind(exercise.category.as_str())
    .bind(&exercise.equipment)
    .bind(&exercise.instructions)
    .bind(exercise.created_by)
    .bind(exercise.is_public)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_exercise(pool, id).await
}
