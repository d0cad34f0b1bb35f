use serde_json::{json, Map, Value};

use super::{
    nutrition::group_by_meal,
    types::{MealType, Restaurant, RestaurantMenu, VerifiedItem, Weekday},
};
use crate::{
    clients::ChatRequest,
    survey::{context::UserContext, dto::MealChoice},
};

fn profile(ctx: &UserContext) -> Value {
    let s = &ctx.survey;
    json!({
        "goal": s.goal,
        "activityLevel": s.activity_level,
        "dietPrefs": s.diet_prefs,
        "foodAllergies": s.food_allergies,
        "strictExclusions": s.strict_exclusions,
        "preferredCuisines": s.preferred_cuisines,
        "biomarkers": s.biomarkers,
        "dailyCalories": ctx.targets.daily_calories,
        "proteinGrams": ctx.targets.protein_grams,
        "carbsGrams": ctx.targets.carbs_grams,
        "fatGrams": ctx.targets.fat_grams,
        "mealCalories": ctx.targets.meal_calories,
        "weeklyBudgetCents": ctx.weekly_budget_cents,
        "mealsOutPerWeek": ctx.meals_out_per_week,
    })
}

pub fn rerank(ctx: &UserContext, candidates: &[Restaurant], keep: usize) -> ChatRequest {
    let list: Vec<Value> = candidates
        .iter()
        .map(|r| {
            json!({
                "placeId": r.place_id,
                "name": r.name,
                "cuisine": r.cuisine,
                "rating": r.rating,
                "priceLevel": r.price_level,
            })
        })
        .collect();
    ChatRequest::json(format!(
        "Rank these restaurants for the user profile and keep the best {keep}. \
         Prefer healthy options matching the diet and cuisines.\n\
         Profile: {}\nRestaurants: {}\n\
         Reply as {{\"rankedPlaceIds\": [\"placeId\", ...]}}.",
        profile(ctx),
        Value::Array(list)
    ))
    .temperature(0.3)
    .max_tokens(1000)
}

pub fn select_items(ctx: &UserContext, menus: &[RestaurantMenu]) -> ChatRequest {
    let menus: Vec<Value> = menus
        .iter()
        .map(|m| {
            json!({
                "restaurant": m.restaurant.name,
                "items": m.items.iter().map(|i| json!({
                    "itemId": i.id,
                    "title": i.title,
                    "calories": i.calories,
                    "protein": i.protein,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    ChatRequest::json(format!(
        "Pick menu items that fit the user's targets, grouped by meal. \
         Use only itemIds from the menus below, 3 to 6 per meal.\n\
         Profile: {}\nMenus: {}\n\
         Reply as {{\"selectedMenuItems\": {{\"breakfast\": [{{\"itemId\": 1, \"itemTitle\": \"\", \
         \"restaurant\": \"\", \"reasoning\": \"\"}}], \"lunch\": [], \"dinner\": []}}}}.",
        profile(ctx),
        Value::Array(menus)
    ))
    .temperature(0.4)
}

fn schedule_for(ctx: &UserContext, day: Weekday) -> Value {
    let mut out = Map::new();
    for meal in MealType::ALL {
        let choice = match ctx.scheduled(day, meal) {
            Some(MealChoice::Home) => "home",
            Some(MealChoice::Restaurant) => "restaurant",
            Some(MealChoice::Skip) => "skip",
            None => "either",
        };
        out.insert(meal.as_str().to_string(), Value::from(choice));
    }
    Value::Object(out)
}

pub fn day_plan(
    ctx: &UserContext,
    day: Weekday,
    verified: &[VerifiedItem],
    restaurants: &[Restaurant],
) -> ChatRequest {
    let items: Map<String, Value> = group_by_meal(verified)
        .into_iter()
        .map(|(meal, group)| {
            let entries = group
                .into_iter()
                .map(|v| {
                    json!({
                        "itemTitle": v.item.item_title,
                        "restaurant": v.item.restaurant,
                        "nutrition": v.nutrition,
                        "dataSource": v.data_source,
                    })
                })
                .collect();
            (meal.as_str().to_string(), Value::Array(entries))
        })
        .collect();
    let links: Vec<Value> = restaurants
        .iter()
        .map(|r| json!({ "name": r.name, "orderingUrl": r.ordering_url, "address": r.address }))
        .collect();
    let day_name = day.as_str();
    ChatRequest::json(format!(
        "Build {day_name}'s restaurant meals from the verified items. Give exactly 2 restaurant \
         options for each meal, varied across the week (this is day {} of 7). \
         Respect the schedule: skip meals marked skip.\n\
         Profile: {}\nSchedule: {}\nVerified items: {}\nRestaurants: {}\n\
         Reply as {{\"dailyMealPlan\": {{\"{day_name}\": {{\"breakfast\": {{\"options\": [{{\"optionNumber\": 1, \
         \"optionType\": \"restaurant\", \"dishName\": \"\", \"restaurantName\": \"\", \"description\": \"\", \
         \"priceCents\": 0, \"calories\": 0, \"protein\": 0, \"carbs\": 0, \"fat\": 0, \"orderingUrl\": \"\"}}]}}, \
         \"lunch\": {{\"options\": []}}, \"dinner\": {{\"options\": []}}}}}}}}.",
        day.index() + 1,
        profile(ctx),
        schedule_for(ctx, day),
        Value::Object(items),
        Value::Array(links)
    ))
    .max_tokens(3000)
}

pub fn home_recipes(ctx: &UserContext, per_meal: usize) -> ChatRequest {
    ChatRequest::json(format!(
        "Create {per_meal} distinct home recipes for each of breakfast, lunch and dinner that fit \
         the user's targets and budget. estimatedCost is in cents per serving.\n\
         Profile: {}\n\
         Reply as {{\"homeRecipes\": {{\"breakfast\": [{{\"recipeName\": \"\", \"description\": \"\", \
         \"ingredients\": [], \"instructions\": [], \"cookingMinutes\": 0, \"calories\": 0, \"protein\": 0, \
         \"carbs\": 0, \"fat\": 0, \"estimatedCost\": 0}}], \"lunch\": [], \"dinner\": []}}, \
         \"recipeSummary\": {{\"totalRecipes\": 0, \"averageCost\": 0}}}}.",
        profile(ctx)
    ))
    .max_tokens(6000)
}

pub fn workout_plan(
    ctx: &UserContext,
    fitness_level: &str,
    training_days: u32,
    session_minutes: u32,
) -> ChatRequest {
    ChatRequest::json(format!(
        "Design a 7-day workout plan for a {fitness_level} with {training_days} training days of \
         about {session_minutes} minutes; the other days are rest or mobility.\n\
         Profile: {}\n\
         Reply as {{\"weeklyPlan\": [{{\"day\": \"monday\", \"focus\": \"\", \"isRestDay\": false, \
         \"durationMinutes\": 0, \"exercises\": [{{\"name\": \"\", \"sets\": 3, \"reps\": \"10\", \
         \"restSeconds\": 60, \"instructions\": \"\"}}]}}], \"summary\": \"\"}} with exactly 7 entries.",
        profile(ctx)
    ))
    .max_tokens(4000)
}
