use chrono::{Days, NaiveDate, Utc};
use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::policy::{require, require_visible};
use crate::auth::{Access, Permission, Resource, Role, User};
use crate::db::nutrition::{
    create_meal, daily_progress, daily_totals, delete_meal, get_active_goal, get_meal,
    list_goal_history, list_meals, meal_breakdown, replace_active_goal, update_meal,
};
use crate::db::users::get_active_user_with_role;
use crate::error::AppError;
use crate::models::{
    DailyProgress, Meal, MealChanges, MealNutrients, MealType, NewMeal, NewNutritionGoal,
    NutritionGoal, NutritionSummary,
};
use crate::response::{ApiResult, created, message_only, ok, ok_with_message};
use crate::validation::{JsonBody, JsonValidateExt, non_blank, parse_optional_date};

const DEFAULT_PROGRESS_DAYS: i64 = 7;
const MAX_PROGRESS_DAYS: i64 = 90;

pub fn routes() -> Vec<rocket::Route> {
    routes![
        meals,
        log_meal,
        edit_meal,
        remove_meal,
        goals,
        set_goal,
        summary,
        progress
    ]
}

#[derive(Deserialize, Validate)]
pub struct NutrientsRequest {
    #[validate(range(min = 0, max = 20000, message = "must be between 0 and 20000"))]
    pub calories: Option<i64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub proteins: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub carbs: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub fats: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub fiber: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub sugar: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub sodium: Option<f64>,
}

impl From<NutrientsRequest> for MealNutrients {
    fn from(n: NutrientsRequest) -> Self {
        MealNutrients {
            calories: n.calories,
            proteins: n.proteins,
            carbs: n.carbs,
            fats: n.fats,
            fiber: n.fiber,
            sugar: n.sugar,
            sodium: n.sodium,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateMealRequest {
    /// Required for coaches and admins; clients always log for themselves.
    pub client_id: Option<i64>,
    pub date: Option<String>,
    pub meal_type: MealType,
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub nutrients: NutrientsRequest,
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateMealRequest {
    pub date: Option<String>,
    pub meal_type: Option<MealType>,
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub nutrients: NutrientsRequest,
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct SetGoalRequest {
    pub client_id: i64,
    #[validate(range(min = 0, max = 20000, message = "must be between 0 and 20000"))]
    pub daily_calories: Option<i64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub daily_proteins: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub daily_carbs: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub daily_fats: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub daily_fiber: Option<f64>,
    #[validate(range(min = 0, max = 20000, message = "must be between 0 and 20000"))]
    pub daily_water_ml: Option<i64>,
}

#[derive(Serialize)]
pub struct GoalHistory {
    pub active: Option<NutritionGoal>,
    pub history: Vec<NutritionGoal>,
}

#[derive(Serialize)]
pub struct ProgressReport {
    pub client_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DailyProgress>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Resolves whose records a request is about: clients only ever their own,
/// everyone else the named client if the policy lets them reach it.
async fn resolve_client(
    db: &Pool<Sqlite>,
    user: &User,
    client_id: Option<i64>,
    access: Access,
) -> Result<i64, AppError> {
    match (user.role, client_id) {
        (Role::Client, Some(id)) if id != user.id => Err(AppError::Authorization(
            "Clients can only access their own nutrition records".to_string(),
        )),
        (Role::Client, _) => Ok(user.id),
        (_, Some(id)) => {
            require(db, user, Resource::ClientRecords { client_id: id }, access).await?;
            Ok(id)
        }
        (_, None) => Err(AppError::Validation("client_id: is required".to_string())),
    }
}

async fn load_meal(db: &Pool<Sqlite>, user: &User, id: i64, access: Access) -> Result<Meal, AppError> {
    let meal = get_meal(db, id).await?;
    require_visible(
        db,
        user,
        Resource::ClientRecords {
            client_id: meal.client_id,
        },
        access,
        "Meal",
    )
    .await?;
    Ok(meal)
}

#[get("/meals?<date>&<client_id>")]
pub async fn meals(
    date: Option<String>,
    client_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Meal>> {
    let client_id = resolve_client(db, &user, client_id, Access::Read).await?;
    let date = parse_optional_date("date", date.as_deref())?.unwrap_or_else(today);

    ok(list_meals(db, client_id, date).await?)
}

#[post("/meals", data = "<body>")]
pub async fn log_meal(
    body: JsonBody<'_, CreateMealRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Meal> {
    user.require_permission(Permission::LogOwnMeals)?;
    let request = body.validated()?;
    let client_id = resolve_client(db, &user, request.client_id, Access::Write).await?;

    let meal = create_meal(
        db,
        &NewMeal {
            client_id,
            date: parse_optional_date("date", request.date.as_deref())?.unwrap_or_else(today),
            meal_type: request.meal_type,
            name: non_blank("name", &request.name)?,
            description: request.description,
            nutrients: request.nutrients.into(),
            notes: request.notes,
        },
    )
    .await?;

    created(meal, "Meal logged successfully")
}

#[put("/meals/<id>", data = "<body>")]
pub async fn edit_meal(
    id: i64,
    body: JsonBody<'_, UpdateMealRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Meal> {
    let request = body.validated()?;
    let meal = load_meal(db, &user, id, Access::Write).await?;

    let changes = MealChanges {
        date: parse_optional_date("date", request.date.as_deref())?,
        meal_type: request.meal_type,
        name: request
            .name
            .as_deref()
            .map(|n| non_blank("name", n))
            .transpose()?,
        description: request.description,
        nutrients: request.nutrients.into(),
        notes: request.notes,
    };

    ok_with_message(
        update_meal(db, meal.id, &changes).await?,
        "Meal updated successfully",
    )
}

#[delete("/meals/<id>")]
pub async fn remove_meal(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let meal = load_meal(db, &user, id, Access::Write).await?;
    delete_meal(db, meal.id).await?;
    message_only("Meal deleted successfully")
}

#[get("/goals/<client_id>")]
pub async fn goals(client_id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<GoalHistory> {
    let client_id = resolve_client(db, &user, Some(client_id), Access::Read).await?;

    ok(GoalHistory {
        active: get_active_goal(db, client_id).await?,
        history: list_goal_history(db, client_id).await?,
    })
}

/// Setting a goal retires the client's previous active goal.
#[post("/goals", data = "<body>")]
pub async fn set_goal(
    body: JsonBody<'_, SetGoalRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<NutritionGoal> {
    user.require_permission(Permission::SetNutritionGoals)?;
    let request = body.validated()?;

    if get_active_user_with_role(db, request.client_id, Role::Client)
        .await?
        .is_none()
    {
        return Err(AppError::Validation(
            "client_id: must reference an active client".to_string(),
        ));
    }
    require(
        db,
        &user,
        Resource::ClientRecords {
            client_id: request.client_id,
        },
        Access::Write,
    )
    .await?;

    let goal = replace_active_goal(
        db,
        &NewNutritionGoal {
            client_id: request.client_id,
            daily_calories: request.daily_calories,
            daily_proteins: request.daily_proteins,
            daily_carbs: request.daily_carbs,
            daily_fats: request.daily_fats,
            daily_fiber: request.daily_fiber,
            daily_water_ml: request.daily_water_ml,
            created_by: user.id,
        },
    )
    .await?;

    created(goal, "Nutrition goal set successfully")
}

#[get("/summary/<client_id>?<date>")]
pub async fn summary(
    client_id: i64,
    date: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<NutritionSummary> {
    let client_id = resolve_client(db, &user, Some(client_id), Access::Read).await?;
    let date = parse_optional_date("date", date.as_deref())?.unwrap_or_else(today);

    ok(NutritionSummary {
        date,
        totals: daily_totals(db, client_id, date).await?,
        goals: get_active_goal(db, client_id).await?,
        meal_breakdown: meal_breakdown(db, client_id, date).await?,
    })
}

/// Daily totals for the last `days` days, today included.
#[get("/progress/<client_id>?<days>")]
pub async fn progress(
    client_id: i64,
    days: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<ProgressReport> {
    let days = days.unwrap_or(DEFAULT_PROGRESS_DAYS);
    if !(1..=MAX_PROGRESS_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "days: must be between 1 and {}",
            MAX_PROGRESS_DAYS
        )));
    }
    let client_id = resolve_client(db, &user, Some(client_id), Access::Read).await?;

    let to = today();
    let from = to
        .checked_sub_days(Days::new((days - 1) as u64))
        .ok_or_else(|| AppError::Validation("days: out of range".to_string()))?;

    ok(ProgressReport {
        client_id,
        from,
        to,
        days: daily_progress(db, client_id, from, to).await?,
    })
}
