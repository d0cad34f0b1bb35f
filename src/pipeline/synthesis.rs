use futures_util::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    prompts,
    timeout::call_json_with_timeout,
    types::{DayPlan, HomeRecipeBatch, Restaurant, VerifiedItem, Weekday},
    Pipeline, PipelineError,
};
use crate::survey::context::UserContext;

const MAX_RECIPES_PER_MEAL: usize = 7;

#[derive(Debug, Default)]
pub struct Synthesis {
    /// One entry per weekday; `None` when that day's call failed.
    pub days: Vec<(Weekday, Option<DayPlan>)>,
    pub home: Option<HomeRecipeBatch>,
}

/// Pulls the day's plan out of the reply. Models answer with
/// `{"dailyMealPlan": {"monday": {...}}}`, `{"monday": {...}}` or the bare
/// day object.
pub fn extract_day(reply: Value, day: Weekday) -> Option<DayPlan> {
    let inner = match reply {
        Value::Object(mut map) => match map.remove("dailyMealPlan") {
            Some(Value::Object(mut days)) => days
                .remove(day.as_str())
                .or_else(|| days.into_iter().next().map(|(_, v)| v))?,
            Some(other) => other,
            None => match map.remove(day.as_str()) {
                Some(v) => v,
                None => Value::Object(map),
            },
        },
        _ => return None,
    };
    serde_json::from_value(inner).ok()
}

/// Home recipes per meal type, enough to rotate through the week.
pub fn recipes_per_meal(ctx: &UserContext) -> usize {
    let per_meal = (ctx.home_meals_per_week as usize).div_ceil(3);
    per_meal.clamp(1, MAX_RECIPES_PER_MEAL)
}

async fn day_plan(
    p: &Pipeline,
    ctx: &UserContext,
    day: Weekday,
    verified: &[VerifiedItem],
    restaurants: &[Restaurant],
) -> (Weekday, Option<DayPlan>) {
    let request = prompts::day_plan(ctx, day, verified, restaurants);
    let label = format!("day-plan:{}", day.as_str());
    let reply = call_json_with_timeout::<Value>(
        p.clients.chat.as_ref(),
        &request,
        p.config.day_plan_timeout,
        &label,
    )
    .await;
    match reply {
        Ok(value) => match extract_day(value, day) {
            Some(plan) => (day, Some(plan)),
            None => {
                warn!(%label, "day plan reply had no usable day");
                (day, None)
            }
        },
        Err(e) => {
            warn!(%label, timeout = e.is_timeout(), error = %e, "day plan failed; leaving day empty");
            (day, None)
        }
    }
}

async fn home_recipes(p: &Pipeline, ctx: &UserContext) -> Option<HomeRecipeBatch> {
    let request = prompts::home_recipes(ctx, recipes_per_meal(ctx));
    let reply = call_json_with_timeout::<HomeRecipeBatch>(
        p.clients.chat.as_ref(),
        &request,
        p.config.home_recipes_timeout,
        "home-recipes",
    )
    .await;
    match reply {
        Ok(batch) => Some(batch),
        Err(e) => {
            warn!(timeout = e.is_timeout(), error = %e, "home recipes failed; restaurant options only");
            None
        }
    }
}

/// Stage 5. Seven day-plan calls and one home-recipe call run together, each
/// under its own timeout. Failures degrade instead of aborting.
pub async fn synthesize(
    p: &Pipeline,
    ctx: &UserContext,
    verified: &[VerifiedItem],
    restaurants: &[Restaurant],
) -> Result<Synthesis, PipelineError> {
    let days = Weekday::ALL
        .into_iter()
        .map(|day| day_plan(p, ctx, day, verified, restaurants));
    let (days, home) = tokio::join!(join_all(days), home_recipes(p, ctx));

    let failed = days.iter().filter(|(_, plan)| plan.is_none()).count();
    info!(
        stage = "synthesis",
        failed_days = failed,
        home_recipes = home.as_ref().map_or(0, |h| h.home_recipes.total()),
        "synthesis done"
    );
    Ok(Synthesis { days, home })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_day_from_each_reply_shape() {
        let option = json!({ "options": [{ "dishName": "Oats" }] });
        let wrapped = json!({ "dailyMealPlan": { "monday": { "breakfast": option } } });
        let keyed = json!({ "tuesday": { "breakfast": option } });
        let bare = json!({ "breakfast": option });

        for (reply, day) in [
            (wrapped, Weekday::Monday),
            (keyed, Weekday::Tuesday),
            (bare, Weekday::Friday),
        ] {
            let plan = extract_day(reply, day).unwrap();
            assert_eq!(plan.breakfast.options[0].dish_name, "Oats");
            assert!(plan.dinner.options.is_empty());
        }
        assert!(extract_day(json!([1, 2]), Weekday::Monday).is_none());
    }

    #[test]
    fn recipe_count_tracks_home_meals() {
        use crate::survey::validate::tests::minimal_survey;
        use time::OffsetDateTime;
        use uuid::Uuid;

        let mut survey = minimal_survey();
        survey.meals_out_per_week = Some(14);
        let ctx = UserContext::new(Uuid::nil(), survey, OffsetDateTime::now_utc());
        assert_eq!(recipes_per_meal(&ctx), 3);

        let mut survey = minimal_survey();
        survey.meals_out_per_week = Some(0);
        let ctx = UserContext::new(Uuid::nil(), survey, OffsetDateTime::now_utc());
        assert_eq!(recipes_per_meal(&ctx), 7);
    }
}
