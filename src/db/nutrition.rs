use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    DailyProgress, DailyTotals, Meal, MealChanges, MealTypeTotals, NewMeal, NewNutritionGoal,
    NutritionGoal,
};

const MEAL_COLUMNS: &str = "id, client_id, date, meal_type, name, description, calories, proteins, \
     carbs, fats, fiber, sugar, sodium, notes, created_at";

const GOAL_COLUMNS: &str = "id, client_id, daily_calories, daily_proteins, daily_carbs, daily_fats, \
     daily_fiber, daily_water_ml, is_active, created_by, created_at";

const MEAL_TYPE_ORDER: &str = "CASE meal_type
    WHEN 'breakfast' THEN 1 WHEN 'lunch' THEN 2 WHEN 'dinner' THEN 3 ELSE 4 END";

#[instrument(skip(pool))]
pub async fn get_meal(pool: &Pool<Sqlite>, id: i64) -> Result<Meal, AppError> {
    sqlx::query_as::<_, Meal>(&format!("SELECT {} FROM meals WHERE id = ?", MEAL_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Meal not found".to_string()))
}

#[instrument(skip(pool))]
pub async fn list_meals(pool: &Pool<Sqlite>, client_id: i64, date: NaiveDate) -> Result<Vec<Meal>, AppError> {
    info!("Listing meals");
    let meals = sqlx::query_as::<_, Meal>(&format!(
        "SELECT {} FROM meals WHERE client_id = ? AND date = ? ORDER BY {}, created_at, id",
        MEAL_COLUMNS, MEAL_TYPE_ORDER
    ))
    .bind(client_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(meals)
}

#[instrument(skip(pool, meal), fields(client_id = meal.client_id))]
pub async fn create_meal(pool: &Pool<Sqlite>, meal: &NewMeal) -> Result<Meal, AppError> {
    info!("Logging meal");
    let n = &meal.nutrients;
    let id = sqlx::query(
        "INSERT INTO meals
            (client_id, date, meal_type, name, description, calories, proteins, carbs, fats,
             fiber, sugar, sodium, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(meal.client_id)
    .bind(meal.date)
    .bind(meal.meal_type.as_str())
    .bind(&meal.name)
    .bind(&meal.description)
    .bind(n.calories)
    .bind(n.proteins)
    .bind(n.carbs)
    .bind(n.fats)
    .bind(n.fiber)
    .bind(n.sugar)
    .bind(n.sodium)
    .bind(&meal.notes)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_meal(pool, id).await
}

#[instrument(skip(pool, changes))]
pub async fn update_meal(pool: &Pool<Sqlite>, id: i64, changes: &MealChanges) -> Result<Meal, AppError> {
    info!("Updating meal");
    let n = &changes.nutrients;
    sqlx::query(
        "UPDATE meals SET
            date = COALESCE(?, date),
            meal_type = COALESCE(?, meal_type),
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            calories = COALESCE(?, calories),
            proteins = COALESCE(?, proteins),
            carbs = COALESCE(?, carbs),
            fats = COALESCE(?, fats),
            fiber = COALESCE(?, fiber),
            sugar = COALESCE(?, sugar),
            sodium = COALESCE(?, sodium),
            notes = COALESCE(?, notes),
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(changes.date)
    .bind(changes.meal_type.map(|t| t.as_str()))
    .bind(&changes.name)
    .bind(&changes.description)
    .bind(n.calories)
    .bind(n.proteins)
    .bind(n.carbs)
    .bind(n.fats)
    .bind(n.fiber)
    .bind(n.sugar)
    .bind(n.sodium)
    .bind(&changes.notes)
    .bind(id)
    .execute(pool)
    .await?;

    get_meal(pool, id).await
}

#[instrument(skip(pool))]
pub async fn delete_meal(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting meal");
    sqlx::query("DELETE FROM meals WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_active_goal(pool: &Pool<Sqlite>, client_id: i64) -> Result<Option<NutritionGoal>, AppError> {
    let goal = sqlx::query_as::<_, NutritionGoal>(&format!(
        "SELECT {} FROM nutrition_goals WHERE client_id = ? AND is_active = 1",
        GOAL_COLUMNS
    ))
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(goal)
}

#[instrument(skip(pool))]
pub async fn list_goal_history(pool: &Pool<Sqlite>, client_id: i64) -> Result<Vec<NutritionGoal>, AppError> {
    let goals = sqlx::query_as::<_, NutritionGoal>(&format!(
        "SELECT {} FROM nutrition_goals WHERE client_id = ? ORDER BY created_at DESC, id DESC",
        GOAL_COLUMNS
    ))
    .bind(client_id)
    .fetch_all(pool)
    .await?;

    Ok(goals)
}

/// Retires the client's active goal and inserts the new one in a single
/// transaction, so the client never has zero or two active goals. Concurrent
/// writers are serialized by SQLite and the last one to commit wins.
#[instrument(skip(pool, goal), fields(client_id = goal.client_id))]
pub async fn replace_active_goal(
    pool: &Pool<Sqlite>,
    goal: &NewNutritionGoal,
) -> Result<NutritionGoal, AppError> {
    info!("Setting nutrition goal");
    let mut tx = pool.begin().await?;

    let retired = sqlx::query(
        "UPDATE nutrition_goals SET is_active = 0 WHERE client_id = ? AND is_active = 1",
    )
    .bind(goal.client_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let id = sqlx::query(
        "INSERT INTO nutrition_goals
            (client_id, daily_calories, daily_proteins, daily_carbs, daily_fats, daily_fiber,
             daily_water_ml, is_active, created_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(goal.client_id)
    .bind(goal.daily_calories)
    .bind(goal.daily_proteins)
    .bind(goal.daily_carbs)
    .bind(goal.daily_fats)
    .bind(goal.daily_fiber)
    .bind(goal.daily_water_ml)
    .bind(goal.created_by)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let stored = sqlx::query_as::<_, NutritionGoal>(&format!(
        "SELECT {} FROM nutrition_goals WHERE id = ?",
        GOAL_COLUMNS
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(retired, goal_id = id, "Nutrition goal replaced");
    Ok(stored)
}

#[instrument(skip(pool))]
pub async fn daily_totals(pool: &Pool<Sqlite>, client_id: i64, date: NaiveDate) -> Result<DailyTotals, AppError> {
    let totals = sqlx::query_as::<_, DailyTotals>(
        "SELECT COALESCE(SUM(calories), 0) AS total_calories,
                TOTAL(proteins) AS total_proteins,
                TOTAL(carbs) AS total_carbs,
                TOTAL(fats) AS total_fats,
                TOTAL(fiber) AS total_fiber,
                TOTAL(sugar) AS total_sugar,
                TOTAL(sodium) AS total_sodium,
                COUNT(*) AS total_meals
         FROM meals WHERE client_id = ? AND date = ?",
    )
    .bind(client_id)
    .bind(date)
    .fetch_one(pool)
    .await?;

    Ok(totals)
}

#[instrument(skip(pool))]
pub async fn meal_breakdown(
    pool: &Pool<Sqlite>,
    client_id: i64,
    date: NaiveDate,
) -> Result<Vec<MealTypeTotals>, AppError> {
    let rows = sqlx::query_as::<_, MealTypeTotals>(&format!(
        "SELECT meal_type,
                COUNT(*) AS meal_count,
                COALESCE(SUM(calories), 0) AS calories,
                TOTAL(proteins) AS proteins,
                TOTAL(carbs) AS carbs,
                TOTAL(fats) AS fats
         FROM meals WHERE client_id = ? AND date = ?
         GROUP BY meal_type
         ORDER BY {}",
        MEAL_TYPE_ORDER
    ))
    .bind(client_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Per-day totals for days with at least one meal in `[from, to]`.
#[instrument(skip(pool))]
pub async fn daily_progress(
    pool: &Pool<Sqlite>,
    client_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DailyProgress>, AppError> {
    let rows = sqlx::query_as::<_, DailyProgress>(
        "SELECT date,
                COUNT(*) AS meal_count,
                COALESCE(SUM(calories), 0) AS calories,
                TOTAL(proteins) AS proteins,
                TOTAL(carbs) AS carbs,
                TOTAL(fats) AS fats
         FROM meals WHERE client_id = ? AND date BETWEEN ? AND ?
         GROUP BY date
         ORDER BY date",
    )
    .bind(client_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
