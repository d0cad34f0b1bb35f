use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use super::{
    synthesis::Synthesis,
    types::{
        DayPlan, HomeRecipe, MealOption, MealType, OptionType, VerifiedItem, WeekSummary,
        WeeklyMealPlan, Weekday,
    },
};

const RESTAURANT_OPTIONS_PER_MEAL: usize = 2;

pub fn price_estimate(cents: u32) -> String {
    format!("${:.2}", f64::from(cents) / 100.0)
}

fn home_option(recipe: &HomeRecipe, option_number: u32) -> MealOption {
    MealOption {
        option_number: Some(option_number),
        option_type: OptionType::Home,
        dish_name: recipe.recipe_name.clone(),
        description: recipe.description.clone(),
        price_cents: recipe.estimated_cost,
        price_estimate: recipe.estimated_cost.map(price_estimate),
        calories: recipe.calories,
        protein: recipe.protein,
        carbs: recipe.carbs,
        fat: recipe.fat,
        ingredients: recipe.ingredients.clone(),
        instructions: recipe.instructions.clone(),
        cooking_minutes: recipe.cooking_minutes,
        ..Default::default()
    }
}

fn normalize(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn same_restaurant(option: &MealOption, v: &VerifiedItem) -> bool {
    option
        .restaurant_name
        .as_deref()
        .is_some_and(|name| normalize(name) == normalize(&v.item.restaurant))
}

/// Attaches verified nutrition to a restaurant option naming a verified item.
/// An exact title match wins, preferring the option's own restaurant. A dish
/// name that only contains a verified title must come from that restaurant.
fn attach_verified(option: &mut MealOption, verified: &[VerifiedItem]) {
    let dish = normalize(&option.dish_name);
    if dish.is_empty() {
        return;
    }
    let exact: Vec<&VerifiedItem> = verified
        .iter()
        .filter(|v| normalize(&v.item.item_title) == dish)
        .collect();
    let found = exact
        .iter()
        .find(|v| same_restaurant(option, v))
        .or_else(|| exact.first())
        .copied()
        .or_else(|| {
            verified.iter().find(|v| {
                let title = normalize(&v.item.item_title);
                !title.is_empty()
                    && same_restaurant(option, v)
                    && format!(" {dish} ").contains(&format!(" {title} "))
            })
        });
    if let Some(nutrition) = found.and_then(|v| v.nutrition.clone()) {
        option.calories = Some(nutrition.calories);
        option.protein = Some(nutrition.protein);
        option.carbs = Some(nutrition.carbs);
        option.fat = Some(nutrition.fat);
        option.verified_nutrition = Some(nutrition);
    }
}

pub(crate) fn summarize(days: &BTreeMap<Weekday, DayPlan>) -> WeekSummary {
    let mut summary = WeekSummary {
        total_days: days.len(),
        ..Default::default()
    };
    for day in days.values() {
        for meal in MealType::ALL {
            let options = &day.meal(meal).options;
            summary.total_meals += 1;
            summary.total_options += options.len();
            if options.is_empty() {
                summary.empty_meals += 1;
            }
            for option in options {
                match option.option_type {
                    OptionType::Restaurant => summary.restaurant_options += 1,
                    OptionType::Home => summary.home_options += 1,
                }
            }
        }
    }
    summary
}

/// Stage 6. Builds the 7 × 3 week: up to two restaurant options per meal
/// from the day plan, then one home recipe rotated by day index. Missing
/// days become empty meals.
pub fn merge(synthesis: Synthesis, verified: &[VerifiedItem]) -> WeeklyMealPlan {
    let mut provided: BTreeMap<Weekday, DayPlan> = synthesis
        .days
        .into_iter()
        .filter_map(|(day, plan)| plan.map(|plan| (day, plan)))
        .collect();
    let recipes = synthesis
        .home
        .as_ref()
        .map(|batch| &batch.home_recipes);

    let mut week = BTreeMap::new();
    for day in Weekday::ALL {
        let mut plan = provided.remove(&day).unwrap_or_default();
        for meal in MealType::ALL {
            let slot = plan.meal_mut(meal);
            slot.options.retain(|o| o.option_type == OptionType::Restaurant);
            slot.options.truncate(RESTAURANT_OPTIONS_PER_MEAL);
            for (i, option) in slot.options.iter_mut().enumerate() {
                option.option_number = Some(i as u32 + 1);
                attach_verified(option, verified);
            }

            if let Some(pool) = recipes.map(|r| r.for_meal(meal)).filter(|p| !p.is_empty()) {
                let recipe = &pool[day.index() % pool.len()];
                let number = slot.options.len() as u32 + 1;
                slot.options.push(home_option(recipe, number));
            }
        }
        week.insert(day, plan);
    }

    let week_summary = summarize(&week);
    info!(
        stage = "merge",
        options = week_summary.total_options,
        empty_meals = week_summary.empty_meals,
        "weekly plan merged"
    );
    WeeklyMealPlan {
        weekly_meal_plan: week,
        week_summary,
        home_recipe_summary: synthesis
            .home
            .map(|h| h.recipe_summary)
            .unwrap_or(Value::Null),
        restriction_violations: Vec::new(),
        validation: None,
    }
}
