use rocket::State;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::policy::{require, require_visible};
use crate::auth::{Access, Permission, Resource, Role, User};
use crate::db::exercises::get_exercise;
use crate::db::notifications::notify;
use crate::db::programs::get_program;
use crate::db::users::get_active_user_with_role;
use crate::db::workouts::{
    WorkoutFilter, add_workout_exercise, create_workout, delete_workout, get_workout,
    list_workout_exercises, list_workouts, update_workout, update_workout_exercise,
};
use crate::error::AppError;
use crate::models::{
    NewNotification, NewWorkout, NewWorkoutExercise, NotificationType, Workout, WorkoutChanges,
    WorkoutDetail, WorkoutExercise, WorkoutExerciseChanges, WorkoutStatus,
};
use crate::response::{ApiResult, PageRequest, created, message_only, ok, ok_with_message, paginated};
use crate::validation::{JsonBody, JsonValidateExt, non_blank, parse_date, parse_optional_date};

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        show,
        create,
        update,
        remove,
        add_exercise,
        update_exercise
    ]
}

#[derive(FromForm)]
pub struct WorkoutsQuery {
    page: Option<i64>,
    limit: Option<i64>,
    client_id: Option<i64>,
    program_id: Option<i64>,
    status: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WorkoutExerciseRequest {
    pub exercise_id: i64,
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub sets: Option<i64>,
    #[validate(range(min = 1, max = 1000, message = "must be between 1 and 1000"))]
    pub reps: Option<i64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub weight: Option<f64>,
    #[validate(range(min = 1, message = "must be positive"))]
    pub duration_seconds: Option<i64>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub rest_seconds: Option<i64>,
    pub notes: Option<String>,
}

impl From<WorkoutExerciseRequest> for NewWorkoutExercise {
    fn from(r: WorkoutExerciseRequest) -> Self {
        Self {
            exercise_id: r.exercise_id,
            sets: r.sets,
            reps: r.reps,
            weight: r.weight,
            duration_seconds: r.duration_seconds,
            rest_seconds: r.rest_seconds,
            notes: r.notes,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateWorkoutRequest {
    pub client_id: i64,
    pub program_id: Option<i64>,
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub scheduled_date: String,
    #[validate(range(min = 1, max = 600, message = "must be between 1 and 600"))]
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub exercises: Vec<WorkoutExerciseRequest>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateWorkoutRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub scheduled_date: Option<String>,
    #[validate(range(min = 1, max = 600, message = "must be between 1 and 600"))]
    pub duration_minutes: Option<i64>,
    pub status: Option<WorkoutStatus>,
    pub notes: Option<String>,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub completion_rating: Option<i64>,
    #[validate(range(min = 0, max = 10000, message = "must be between 0 and 10000"))]
    pub calories_burned: Option<i64>,
}

impl UpdateWorkoutRequest {
    /// Fields only the coaching side may change.
    fn touches_plan(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.scheduled_date.is_some()
            || self.duration_minutes.is_some()
    }
}

#[derive(Deserialize, Validate)]
pub struct UpdateWorkoutExerciseRequest {
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub sets: Option<i64>,
    #[validate(range(min = 1, max = 1000, message = "must be between 1 and 1000"))]
    pub reps: Option<i64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub weight: Option<f64>,
    #[validate(range(min = 1, message = "must be positive"))]
    pub duration_seconds: Option<i64>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub rest_seconds: Option<i64>,
    pub notes: Option<String>,
    pub completed: Option<bool>,
}

async fn load_visible(db: &Pool<Sqlite>, user: &User, id: i64) -> Result<Workout, AppError> {
    let workout = get_workout(db, id).await?;
    require_visible(db, user, Resource::from(&workout), Access::Read, "Workout").await?;
    Ok(workout)
}

async fn detail(db: &Pool<Sqlite>, id: i64) -> Result<WorkoutDetail, AppError> {
    Ok(WorkoutDetail {
        workout: get_workout(db, id).await?,
        exercises: list_workout_exercises(db, id).await?,
    })
}

/// Workouts may only reference exercises the author can see in the library.
async fn check_exercise_usable(
    db: &Pool<Sqlite>,
    user: &User,
    exercise_id: i64,
) -> Result<(), AppError> {
    match get_exercise(db, exercise_id).await {
        Ok(exercise) if user.is_admin() || exercise.visible_to(user.id) => Ok(()),
        Ok(_) | Err(AppError::NotFound(_)) => Err(AppError::Validation(format!(
            "exercise_id: exercise {} does not exist",
            exercise_id
        ))),
        Err(err) => Err(err),
    }
}

#[get("/?<q..>")]
pub async fn list(q: WorkoutsQuery, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Workout>> {
    let page = PageRequest::new(q.page, q.limit);
    let filter = WorkoutFilter {
        client_id: q.client_id,
        program_id: q.program_id,
        status: q.status.as_deref().map(str::parse).transpose()?,
        from: parse_optional_date("from", q.from.as_deref())?,
        to: parse_optional_date("to", q.to.as_deref())?,
    };

    let (workouts, total) = list_workouts(db, &user, &filter, &page).await?;
    paginated(workouts, &page, total)
}

#[get("/<id>")]
pub async fn show(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<WorkoutDetail> {
    let workout = load_visible(db, &user, id).await?;
    ok(detail(db, workout.id).await?)
}

#[post("/", data = "<body>")]
pub async fn create(
    body: JsonBody<'_, CreateWorkoutRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<WorkoutDetail> {
    user.require_permission(Permission::ManageWorkouts)?;
    let request = body.validated()?;

    if get_active_user_with_role(db, request.client_id, Role::Client)
        .await?
        .is_none()
    {
        return Err(AppError::Validation(
            "client_id: must reference an active client".to_string(),
        ));
    }

    match request.program_id {
        Some(program_id) => {
            let program = get_program(db, program_id).await?;
            require(db, &user, Resource::from(&program), Access::Write).await?;
            if program.client_id != Some(request.client_id) {
                return Err(AppError::Validation(
                    "program_id: program is not assigned to this client".to_string(),
                ));
            }
        }
        None => {
            require(
                db,
                &user,
                Resource::ClientRecords {
                    client_id: request.client_id,
                },
                Access::Write,
            )
            .await?;
        }
    }

    for exercise in &request.exercises {
        check_exercise_usable(db, &user, exercise.exercise_id).await?;
    }

    let name = non_blank("name", &request.name)?;
    let scheduled_date = parse_date("scheduled_date", &request.scheduled_date)?;
    let exercises: Vec<NewWorkoutExercise> =
        request.exercises.into_iter().map(Into::into).collect();

    let id = create_workout(
        db,
        &NewWorkout {
            program_id: request.program_id,
            client_id: request.client_id,
            created_by: user.id,
            name: name.clone(),
            description: request.description,
            scheduled_date,
            duration_minutes: request.duration_minutes,
            notes: request.notes,
        },
        &exercises,
    )
    .await?;

    notify(
        db,
        &NewNotification {
            user_id: request.client_id,
            title: "New workout scheduled".to_string(),
            body: format!("\"{}\" is scheduled for {}", name, scheduled_date),
            notification_type: NotificationType::Workout,
            reference_id: Some(id),
            reference_type: Some("workout"),
        },
    )
    .await?;

    created(detail(db, id).await?, "Workout created successfully")
}

/// Clients may log progress on their own workouts (status, notes, rating,
/// calories). Everything else needs the coaching side.
#[put("/<id>", data = "<body>")]
pub async fn update(
    id: i64,
    body: JsonBody<'_, UpdateWorkoutRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<WorkoutDetail> {
    let request = body.validated()?;
    let workout = load_visible(db, &user, id).await?;

    if user.role == Role::Client {
        user.require_permission(Permission::UpdateOwnWorkouts)?;
        if request.touches_plan() {
            return Err(AppError::Authorization(
                "Clients may only update status, notes, rating and calories".to_string(),
            ));
        }
    } else {
        require(db, &user, Resource::from(&workout), Access::Write).await?;
    }

    let status = request
        .status
        .map(|next| workout.status.transition_to(next))
        .transpose()?;

    let changes = WorkoutChanges {
        name: request
            .name
            .as_deref()
            .map(|n| non_blank("name", n))
            .transpose()?,
        description: request.description,
        scheduled_date: parse_optional_date("scheduled_date", request.scheduled_date.as_deref())?,
        duration_minutes: request.duration_minutes,
        status,
        notes: request.notes,
        completion_rating: request.completion_rating,
        calories_burned: request.calories_burned,
    };
    update_workout(db, workout.id, &changes).await?;

    ok_with_message(detail(db, workout.id).await?, "Workout updated successfully")
}

#[delete("/<id>")]
pub async fn remove(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let workout = load_visible(db, &user, id).await?;
    user.require_permission(Permission::ManageWorkouts)?;
    require(db, &user, Resource::from(&workout), Access::Write).await?;

    delete_workout(db, workout.id).await?;
    message_only("Workout deleted successfully")
}

#[post("/<id>/exercises", data = "<body>")]
pub async fn add_exercise(
    id: i64,
    body: JsonBody<'_, WorkoutExerciseRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<WorkoutExercise> {
    let request = body.validated()?;
    let workout = load_visible(db, &user, id).await?;
    user.require_permission(Permission::ManageWorkouts)?;
    require(db, &user, Resource::from(&workout), Access::Write).await?;

    check_exercise_usable(db, &user, request.exercise_id).await?;
    let entry = add_workout_exercise(db, workout.id, &request.into()).await?;
    created(entry, "Exercise added to workout")
}

/// Clients may tick exercises off and leave notes; coaches edit the
/// prescription too.
#[put("/<id>/exercises/<exercise_id>", data = "<body>")]
pub async fn update_exercise(
    id: i64,
    exercise_id: i64,
    body: JsonBody<'_, UpdateWorkoutExerciseRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<WorkoutExercise> {
    let request = body.validated()?;
    let workout = load_visible(db, &user, id).await?;

    let changes = if user.role == Role::Client {
        WorkoutExerciseChanges {
            notes: request.notes,
            completed: request.completed,
            ..Default::default()
        }
    } else {
        require(db, &user, Resource::from(&workout), Access::Write).await?;
        WorkoutExerciseChanges {
            sets: request.sets,
            reps: request.reps,
            weight: request.weight,
            duration_seconds: request.duration_seconds,
            rest_seconds: request.rest_seconds,
            notes: request.notes,
            completed: request.completed,
        }
    };

    ok(update_workout_exercise(db, workout.id, exercise_id, &changes).await?)
}
