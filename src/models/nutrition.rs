use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::{string_enum, utc};

string_enum! {
    MealType("meal type") {
        Breakfast => "breakfast",
        Lunch => "lunch",
        Dinner => "dinner",
        Snack => "snack",
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Meal {
    pub id: i64,
    pub client_id: i64,
    pub date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub meal_type: MealType,
    pub name: String,
    pub description: Option<String>,
    pub calories: Option<i64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub notes: Option<String>,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
}

/// Macro and energy values shared by meal inserts and updates.
#[derive(Debug, Clone, Default)]
pub struct MealNutrients {
    pub calories: Option<i64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub client_id: i64,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub name: String,
    pub description: Option<String>,
    pub nutrients: MealNutrients,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MealChanges {
    pub date: Option<NaiveDate>,
    pub meal_type: Option<MealType>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub nutrients: MealNutrients,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NutritionGoal {
    pub id: i64,
    pub client_id: i64,
    pub daily_calories: Option<i64>,
    pub daily_proteins: Option<f64>,
    pub daily_carbs: Option<f64>,
    pub daily_fats: Option<f64>,
    pub daily_fiber: Option<f64>,
    pub daily_water_ml: Option<i64>,
    pub is_active: bool,
    pub created_by: i64,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct NewNutritionGoal {
    pub client_id: i64,
    pub daily_calories: Option<i64>,
    pub daily_proteins: Option<f64>,
    pub daily_carbs: Option<f64>,
    pub daily_fats: Option<f64>,
    pub daily_fiber: Option<f64>,
    pub daily_water_ml: Option<i64>,
    pub created_by: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailyTotals {
    pub total_calories: i64,
    pub total_proteins: f64,
    pub total_carbs: f64,
    pub total_fats: f64,
    pub total_fiber: f64,
    pub total_sugar: f64,
    pub total_sodium: f64,
    pub total_meals: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MealTypeTotals {
    #[sqlx(try_from = "String")]
    pub meal_type: MealType,
    pub meal_count: i64,
    pub calories: i64,
    pub proteins: f64,
    pub carbs: f64,
    pub fats: f64,
}

#[derive(Debug, Serialize)]
pub struct NutritionSummary {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: DailyTotals,
    pub goals: Option<NutritionGoal>,
    #[serde(rename = "mealBreakdown")]
    pub meal_breakdown: Vec<MealTypeTotals>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub meal_count: i64,
    pub calories: i64,
    pub proteins: f64,
    pub carbs: f64,
    pub fats: f64,
}
