use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    dto::{MealChoice, SurveyInput},
    targets::{nutrition_targets, weekly_budget_cents, NutritionTargets},
};
use crate::{
    pipeline::types::{MealType, Weekday},
    plans::week_start,
};

pub const MEALS_PER_WEEK: u32 = 21;
const DEFAULT_MEALS_OUT: u32 = 5;

/// Read-only input handed to every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub survey_id: Uuid,
    pub survey: SurveyInput,
    pub targets: NutritionTargets,
    pub weekly_budget_cents: u32,
    pub week_of: Date,
    pub meals_out_per_week: u32,
    pub home_meals_per_week: u32,
}

impl UserContext {
    pub fn new(survey_id: Uuid, survey: SurveyInput, now: OffsetDateTime) -> Self {
        let targets = nutrition_targets(&survey);
        let weekly_budget_cents =
            weekly_budget_cents(&survey.budget_tier, survey.zip_code.as_deref());
        let meals_out_per_week = survey
            .meals_out_per_week
            .unwrap_or(DEFAULT_MEALS_OUT)
            .min(MEALS_PER_WEEK);
        Self {
            survey_id,
            targets,
            weekly_budget_cents,
            week_of: week_start(now.date()),
            meals_out_per_week,
            home_meals_per_week: MEALS_PER_WEEK - meals_out_per_week,
            survey,
        }
    }

    pub fn radius_miles(&self) -> f64 {
        self.survey
            .distance_preference
            .unwrap_or_default()
            .radius_miles()
    }

    /// Meal choice from the weekly schedule; unscheduled meals are open to
    /// either option.
    pub fn scheduled(&self, day: Weekday, meal: MealType) -> Option<MealChoice> {
        self.survey
            .weekly_meal_schedule
            .as_ref()
            .and_then(|s| s.get(&day))
            .and_then(|meals| meals.get(&meal))
            .copied()
    }

    pub fn diet(&self) -> String {
        self.survey.diet_prefs.join(" ")
    }
}
