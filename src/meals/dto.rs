use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::groceries::GroceryList;
use crate::{
    pipeline::{
        sequencer::{Performance, Stage},
        types::{MealType, Restaurant, SelectedItems, WeeklyMealPlan, Weekday},
    },
    survey::targets::NutritionTargets,
};

/// What a meal plan row keeps in `plan_data`. Rows written by the
/// restaurant-only route carry no `mealPlan` yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanData {
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_items: Option<SelectedItems>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_plan: Option<WeeklyMealPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
    #[serde(default)]
    pub home_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grocery_list: Option<GroceryList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default)]
    pub survey_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRef {
    #[serde(default)]
    pub survey_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRef {
    #[serde(default)]
    pub survey_id: Option<Uuid>,
    #[serde(default)]
    pub meal_plan_id: Option<Uuid>,
}

/// Fields are optional so a missing one is reported by name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(default)]
    pub day: Option<Weekday>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
    #[serde(default)]
    pub option_number: Option<u32>,
    #[serde(default)]
    pub survey_id: Option<Uuid>,
    #[serde(default)]
    pub meal_plan_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectResponse {
    pub success: bool,
    pub message: &'static str,
    pub meal_plan_id: Uuid,
    pub day: Weekday,
    pub meal_type: MealType,
    pub option_number: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryResponse {
    pub success: bool,
    pub meal_plan_id: Uuid,
    pub grocery_list: GroceryList,
    pub item_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_plan_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regeneration_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_regenerations: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MealPlanData>,
}

impl GenerateResponse {
    /// A run that ended without a plan but is still a successful request.
    pub fn nothing(stage: Option<Stage>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            stage,
            meal_plan_id: None,
            status: None,
            regeneration_count: None,
            remaining_regenerations: None,
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRestaurant {
    pub name: String,
    pub address: String,
    pub cuisine: Option<String>,
    pub rating: Option<f64>,
    pub ordering_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub meal_type: MealType,
    pub item_title: String,
    pub restaurant: String,
    pub reasoning: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningPreview {
    pub success: bool,
    /// `ready` when built from a stored plan, `generating` otherwise.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub restaurants: Vec<PreviewRestaurant>,
    pub explanations: Vec<Explanation>,
    pub home_only: bool,
    pub targets: NutritionTargets,
    pub weekly_budget_cents: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatusView {
    pub exists: bool,
    pub status: Option<String>,
    pub regeneration_count: i32,
    pub remaining_regenerations: i32,
    pub week_of: Option<Date>,
    pub meal_plan_id: Option<Uuid>,
}
