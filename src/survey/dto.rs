use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::targets::NutritionTargets;
use crate::pipeline::types::{MealType, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Goal {
    WeightLoss,
    MuscleGain,
    Endurance,
    GeneralWellness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtremelyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistancePreference {
    Close,
    #[default]
    Medium,
    Far,
}

impl DistancePreference {
    pub fn radius_miles(self) -> f64 {
        match self {
            DistancePreference::Close => 2.0,
            DistancePreference::Medium => 5.0,
            DistancePreference::Far => 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealChoice {
    Home,
    Restaurant,
    Skip,
}

pub type WeeklySchedule = BTreeMap<Weekday, BTreeMap<MealType, MealChoice>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biomarkers {
    #[serde(default)]
    pub cholesterol: Option<f64>,
    #[serde(default, rename = "vitaminD")]
    pub vitamin_d: Option<f64>,
    #[serde(default)]
    pub iron: Option<f64>,
}

/// A validated survey. Only `survey::validate` builds these from client input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyInput {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub sex: Option<String>,
    /// Inches.
    #[serde(default)]
    pub height: Option<f64>,
    /// Pounds.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    pub goal: Goal,
    #[serde(default)]
    pub activity_level: Option<ActivityLevel>,
    pub budget_tier: String,
    #[serde(default)]
    pub diet_prefs: Vec<String>,
    #[serde(default)]
    pub preferred_cuisines: Vec<String>,
    #[serde(default)]
    pub food_allergies: Vec<String>,
    /// Disliked foods by category (`dairy`, `pork`, ...); a category key
    /// alone excludes the whole category.
    #[serde(default)]
    pub strict_exclusions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub meals_out_per_week: Option<u32>,
    #[serde(default)]
    pub distance_preference: Option<DistancePreference>,
    #[serde(default)]
    pub weekly_meal_schedule: Option<WeeklySchedule>,
    #[serde(default)]
    pub biomarkers: Option<Biomarkers>,
    #[serde(default)]
    pub source: Option<String>,
}

impl SurveyInput {
    /// Street, city, state and ZIP joined for geocoding.
    pub fn location(&self) -> String {
        [
            &self.street_address,
            &self.city,
            &self.state,
            &self.zip_code,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref().map(str::trim))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyCreated {
    pub ok: bool,
    pub survey_id: Uuid,
    pub targets: NutritionTargets,
    pub weekly_budget_cents: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyView {
    pub id: Uuid,
    pub survey: SurveyInput,
    pub targets: NutritionTargets,
    pub weekly_budget_cents: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
