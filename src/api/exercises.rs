use rocket::State;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::exercises::{NewExercise, create_exercise, get_exercise, list_exercises};
use crate::error::AppError;
use crate::models::{Exercise, ExerciseCategory};
use crate::response::{ApiResult, created, ok};
use crate::validation::{JsonBody, JsonValidateExt, non_blank};

pub fn routes() -> Vec<rocket::Route> {
    routes![list, show, create]
}

#[derive(Deserialize, Validate)]
pub struct CreateExerciseRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<ExerciseCategory>,
    pub equipment: Option<String>,
    pub instructions: Option<String>,
    pub is_public: Option<bool>,
}

#[get("/?<category>&<search>")]
pub async fn list(
    category: Option<String>,
    search: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Exercise>> {
    let category = category.as_deref().map(str::parse).transpose()?;
    let visible_to = (!user.is_admin()).then_some(user.id);

    ok(list_exercises(db, visible_to, category, search.as_deref()).await?)
}

#[get("/<id>")]
pub async fn show(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Exercise> {
    let exercise = get_exercise(db, id).await?;
    if !user.is_admin() && !exercise.visible_to(user.id) {
        return Err(AppError::NotFound("Exercise not found".to_string()));
    }
    ok(exercise)
}

#[post("/", data = "<body>")]
pub async fn create(
    body: JsonBody<'_, CreateExerciseRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Exercise> {
    user.require_permission(Permission::ManageExercises)?;
    let request = body.validated()?;

    let exercise = create_exercise(
        db,
        &NewExercise {
            name: non_blank("name", &request.name)?,
            description: request.description,
            category: request.category.unwrap_or(ExerciseCategory::Strength),
            equipment: request.equipment,
            instructions: request.instructions,
            created_by: user.id,
            is_public: request.is_public.unwrap_or(true),
        },
    )
    .await?;

    created(exercise, "Exercise created successfully")
}
