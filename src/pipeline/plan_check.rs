//! Calorie sanity checks on the merged week against the user's targets.
//! Findings are reported, never enforced.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::{MealOption, MealType, WeeklyMealPlan};
use crate::survey::targets::NutritionTargets;

const MEAL_WARN_PCT: f64 = 10.0;
const MEAL_ERROR_PCT: f64 = 15.0;
const DAY_WARN_PCT: f64 = 8.0;
const DAY_ERROR_PCT: f64 = 10.0;
const MACRO_WARN_PCT: f64 = 15.0;
const MIN_MEAL_CALORIES: f64 = 150.0;
const LOW_MEAL_CALORIES: f64 = 200.0;
const MAX_MEAL_CALORIES: f64 = 1200.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCheck {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

fn meal_target(targets: &NutritionTargets, meal: MealType) -> f64 {
    f64::from(match meal {
        MealType::Breakfast => targets.meal_calories.breakfast,
        MealType::Lunch => targets.meal_calories.lunch,
        MealType::Dinner => targets.meal_calories.dinner,
    })
}

fn deviation(actual: f64, target: f64) -> f64 {
    (actual - target).abs() / target * 100.0
}

fn check_option(label: &str, option: &MealOption, target: f64, check: &mut PlanCheck) {
    let Some(calories) = option.calories else {
        return;
    };
    if target > 0.0 {
        let pct = deviation(calories, target);
        let off = format!("{label}: {pct:.0}% off target ({calories:.0} vs {target:.0} cal)");
        if pct > MEAL_ERROR_PCT {
            check.errors.push(off);
        } else if pct > MEAL_WARN_PCT {
            check.warnings.push(off);
        }
    }

    if calories < MIN_MEAL_CALORIES {
        check
            .errors
            .push(format!("{label}: too low ({calories:.0} cal)"));
    } else if calories < LOW_MEAL_CALORIES {
        check
            .warnings
            .push(format!("{label}: suspiciously low ({calories:.0} cal)"));
    }
    if calories > MAX_MEAL_CALORIES {
        check
            .errors
            .push(format!("{label}: too high ({calories:.0} cal)"));
    }

    if let (Some(p), Some(c), Some(f)) = (option.protein, option.carbs, option.fat) {
        let from_macros = p * 4.0 + c * 4.0 + f * 9.0;
        if calories > 0.0 && deviation(from_macros, calories) > MACRO_WARN_PCT {
            check.warnings.push(format!(
                "{label}: macros add up to {from_macros:.0} cal, stated {calories:.0}"
            ));
        }
    }
}

/// Every option is checked against its meal's calorie target. A day whose
/// three meals all have a first option with calories is also checked as a
/// whole.
pub fn check_calories(plan: &WeeklyMealPlan, targets: &NutritionTargets) -> PlanCheck {
    let mut check = PlanCheck::default();
    let daily_target = f64::from(targets.daily_calories);

    for (day, day_plan) in &plan.weekly_meal_plan {
        let mut day_total = Some(0.0);
        for meal in MealType::ALL {
            let options = &day_plan.meal(meal).options;
            let target = meal_target(targets, meal);
            for option in options {
                let label = format!("{} {} \"{}\"", day.as_str(), meal.as_str(), option.dish_name);
                check_option(&label, option, target, &mut check);
            }
            day_total = match (day_total, options.first().and_then(|o| o.calories)) {
                (Some(total), Some(calories)) => Some(total + calories),
                _ => None,
            };
        }

        if let Some(total) = day_total.filter(|_| daily_target > 0.0) {
            let pct = deviation(total, daily_target);
            let line = format!(
                "{} daily total: {pct:.0}% off target ({total:.0} vs {daily_target:.0} cal)",
                day.as_str()
            );
            if pct > DAY_ERROR_PCT {
                check.errors.push(line);
            } else if pct > DAY_WARN_PCT {
                check.warnings.push(line);
            }
        }
    }

    check.valid = check.errors.is_empty();
    for line in &check.errors {
        warn!(stage = "validation", "{line}");
    }
    info!(
        stage = "validation",
        valid = check.valid,
        warnings = check.warnings.len(),
        errors = check.errors.len(),
        "calorie check finished"
    );
    check
}
