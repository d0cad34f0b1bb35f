use serde::{Deserialize, Serialize};

use super::dto::{ActivityLevel, Goal, SurveyInput};

const DEFAULT_AGE: f64 = 30.0;
const DEFAULT_HEIGHT_IN: f64 = 68.0;
const DEFAULT_WEIGHT_LB: f64 = 150.0;
const KG_PER_LB: f64 = 0.453592;
const CM_PER_IN: f64 = 2.54;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCalories {
    pub breakfast: u32,
    pub lunch: u32,
    pub dinner: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionTargets {
    pub bmr: u32,
    pub tdee: u32,
    pub daily_calories: u32,
    pub protein_grams: u32,
    pub carbs_grams: u32,
    pub fat_grams: u32,
    pub meal_calories: MealCalories,
}

fn activity_factor(level: Option<ActivityLevel>) -> f64 {
    match level {
        Some(ActivityLevel::Sedentary) => 1.2,
        Some(ActivityLevel::LightlyActive) => 1.375,
        Some(ActivityLevel::ModeratelyActive) | None => 1.55,
        Some(ActivityLevel::VeryActive) => 1.725,
        Some(ActivityLevel::ExtremelyActive) => 1.9,
    }
}

fn goal_ratio(goal: Goal) -> f64 {
    match goal {
        Goal::WeightLoss => 0.8,
        Goal::MuscleGain => 1.15,
        Goal::Endurance => 1.1,
        Goal::GeneralWellness => 1.0,
    }
}

/// (protein, fat) share of calories; carbs take the rest.
fn macro_split(goal: Goal) -> (f64, f64) {
    match goal {
        Goal::WeightLoss => (0.35, 0.25),
        Goal::MuscleGain => (0.30, 0.25),
        Goal::Endurance => (0.20, 0.25),
        Goal::GeneralWellness => (0.25, 0.30),
    }
}

/// Mifflin-St Jeor. Anything other than "male" uses the female constant.
pub fn bmr(age: f64, male: bool, height_in: f64, weight_lb: f64) -> u32 {
    let kg = weight_lb * KG_PER_LB;
    let cm = height_in * CM_PER_IN;
    let base = 10.0 * kg + 6.25 * cm - 5.0 * age;
    let bmr = if male { base + 5.0 } else { base - 161.0 };
    bmr.round().max(0.0) as u32
}

pub fn nutrition_targets(survey: &SurveyInput) -> NutritionTargets {
    let age = survey.age.map(f64::from).unwrap_or(DEFAULT_AGE);
    let male = survey
        .sex
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("male"))
        .unwrap_or(true);
    let height = survey.height.unwrap_or(DEFAULT_HEIGHT_IN);
    let weight = survey.weight.unwrap_or(DEFAULT_WEIGHT_LB);

    let bmr = bmr(age, male, height, weight);
    let tdee = (f64::from(bmr) * activity_factor(survey.activity_level)).round() as u32;
    let daily = (f64::from(tdee) * goal_ratio(survey.goal)).round();

    let (protein, fat) = macro_split(survey.goal);
    let carbs = 1.0 - protein - fat;

    NutritionTargets {
        bmr,
        tdee,
        daily_calories: daily as u32,
        protein_grams: (daily * protein / 4.0).round() as u32,
        carbs_grams: (daily * carbs / 4.0).round() as u32,
        fat_grams: (daily * fat / 9.0).round() as u32,
        meal_calories: MealCalories {
            breakfast: (daily * 0.25).round() as u32,
            lunch: (daily * 0.35).round() as u32,
            dinner: (daily * 0.40).round() as u32,
        },
    }
}

fn tier_budget(tier: &str) -> (f64, f64) {
    match tier.trim().to_lowercase().as_str() {
        "low" => (4000.0, 1.0),
        "high" => (10000.0, 1.5),
        "premium" => (15000.0, 2.0),
        _ => (7000.0, 1.2),
    }
}

/// Cost-of-living multiplier from the first three ZIP digits.
pub fn regional_multiplier(zip: Option<&str>) -> f64 {
    let prefix = zip
        .map(str::trim)
        .and_then(|z| z.get(..3))
        .filter(|prefix| prefix.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|prefix| prefix.parse::<u32>().ok());
    match prefix {
        Some(900..=961) => 1.3,
        Some(100..=149) => 1.25,
        Some(10..=27) => 1.2,
        Some(967..=968) => 1.4,
        _ => 1.0,
    }
}

/// Weekly dining budget in cents.
pub fn weekly_budget_cents(tier: &str, zip: Option<&str>) -> u32 {
    let (base, multiplier) = tier_budget(tier);
    (base * multiplier * regional_multiplier(zip)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::validate::tests::minimal_survey;

    #[test]
    fn mifflin_st_jeor_for_reference_profile() {
        let mut survey = minimal_survey();
        survey.age = Some(30);
        survey.sex = Some("male".into());
        survey.height = Some(70.0);
        survey.weight = Some(180.0);
        survey.activity_level = Some(ActivityLevel::ModeratelyActive);
        survey.goal = Goal::GeneralWellness;

        let t = nutrition_targets(&survey);
        assert_eq!(t.bmr, 1783);
        assert_eq!(t.tdee, 2764);
        assert_eq!(t.daily_calories, 2764);
        assert_eq!(t.protein_grams, 173);
        assert_eq!(t.fat_grams, 92);
        assert_eq!(t.carbs_grams, 311);
        assert_eq!(
            t.meal_calories,
            MealCalories {
                breakfast: 691,
                lunch: 967,
                dinner: 1106,
            }
        );
    }

    #[test]
    fn female_constant_and_weight_loss_ratio() {
        let mut survey = minimal_survey();
        survey.age = Some(40);
        survey.sex = Some("female".into());
        survey.height = Some(64.0);
        survey.weight = Some(140.0);
        survey.activity_level = Some(ActivityLevel::Sedentary);
        survey.goal = Goal::WeightLoss;

        let t = nutrition_targets(&survey);
        // 10*63.50288 + 6.25*162.56 - 200 - 161 = 1290.03
        assert_eq!(t.bmr, 1290);
        assert_eq!(t.tdee, 1548);
        assert_eq!(t.daily_calories, 1238);
    }

    #[test]
    fn missing_profile_uses_defaults() {
        let t = nutrition_targets(&minimal_survey());
        assert_eq!(t.bmr, bmr(30.0, true, 68.0, 150.0));
    }

    #[test]
    fn budget_combines_tier_and_region() {
        assert_eq!(weekly_budget_cents("low", None), 4000);
        assert_eq!(weekly_budget_cents("medium", Some("60614")), 8400);
        assert_eq!(weekly_budget_cents("premium", Some("94103")), 39000);
        assert_eq!(weekly_budget_cents("high", Some("10001")), 18750);
        assert_eq!(weekly_budget_cents("unknown", Some("02139")), 10080);
        assert_eq!(weekly_budget_cents("low", Some("96813")), 5600);
    }

    #[test]
    fn non_ascii_zip_uses_base_multiplier() {
        assert_eq!(regional_multiplier(Some("ééé")), 1.0);
        assert_eq!(regional_multiplier(Some("9é")), 1.0);
        assert_eq!(regional_multiplier(Some("+12345")), 1.0);
        assert_eq!(weekly_budget_cents("low", Some("ééé")), 4000);
    }
}
