use anyhow::Context;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{
        Explanation, GenerateResponse, GroceryResponse, MealPlanData, PlanStatusView,
        PlanningPreview, PreviewRestaurant, SelectRequest, SelectResponse,
    },
    groceries::build_grocery_list,
};
use crate::{
    error::ApiError,
    pipeline::{
        fallback::{HOME_ONLY_MESSAGE, STILL_GENERATING_MESSAGE},
        run_pipeline, run_restaurant_stages,
        types::{MealType, Weekday},
        PipelineOutcome,
    },
    plans::{
        next_regeneration_count, remaining_regenerations,
        repo::{self, NewPlan, PlanRow},
        PlanKind, PlanStatus,
    },
    state::AppState,
    survey::{context::UserContext, services::StoredSurvey},
};

const PREVIEW_RESTAURANTS: usize = 6;

fn encode(data: &MealPlanData) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(data).context("encode plan data")?)
}

/// Rows written by older builds may not decode; they read as empty.
pub fn decode(row: &PlanRow) -> MealPlanData {
    serde_json::from_value(row.plan_data.clone()).unwrap_or_else(|e| {
        warn!(plan_id = %row.id, error = %e, "plan data unreadable");
        MealPlanData::default()
    })
}

fn stored_response(row: &PlanRow, data: MealPlanData, message: Option<String>) -> GenerateResponse {
    GenerateResponse {
        success: true,
        message,
        stage: None,
        meal_plan_id: Some(row.id),
        status: Some(row.status.clone()),
        regeneration_count: Some(row.regeneration_count),
        remaining_regenerations: Some(remaining_regenerations(row.regeneration_count)),
        data: Some(data),
    }
}

fn context_json(ctx: &UserContext) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(ctx).context("encode user context")?)
}

/// Full pipeline run. The week's active plan is archived and replaced; the
/// regeneration cap applies unless `force` is set.
pub async fn generate_meal_plan(
    state: &AppState,
    stored: &StoredSurvey,
    force: bool,
) -> Result<GenerateResponse, ApiError> {
    let ctx = stored.context();
    let existing = repo::find_active(&state.db, PlanKind::Meal, stored.id, ctx.week_of).await?;
    let regeneration_count =
        next_regeneration_count(existing.as_ref().map(|r| r.regeneration_count), force)?;

    let generated = match run_pipeline(&state.pipeline(), &ctx).await? {
        PipelineOutcome::Complete(generated) => generated,
        PipelineOutcome::Empty { stage, message } => {
            return Ok(GenerateResponse::nothing(Some(stage), message))
        }
    };

    let data = MealPlanData {
        restaurants: generated.restaurants,
        selected_items: Some(generated.selected),
        meal_plan: Some(generated.plan),
        performance: Some(generated.performance),
        home_only: false,
        grocery_list: None,
    };
    let row = repo::replace_current(
        &state.db,
        PlanKind::Meal,
        &NewPlan {
            survey_id: stored.id,
            user_id: stored.user_id.clone(),
            week_of: ctx.week_of,
            status: PlanStatus::Active,
            regeneration_count,
            user_context: context_json(&ctx)?,
            plan_data: encode(&data)?,
        },
    )
    .await?;
    info!(survey_id = %stored.id, plan_id = %row.id, regeneration_count, "meal plan stored");
    Ok(stored_response(&row, data, None))
}

/// Fire-and-forget generation after a survey is submitted. A restart loses
/// the run.
pub fn spawn_generation(state: AppState, stored: StoredSurvey) {
    tokio::spawn(async move {
        match generate_meal_plan(&state, &stored, false).await {
            Ok(response) => info!(
                survey_id = %stored.id,
                plan_id = ?response.meal_plan_id,
                outcome = ?response.message,
                "background generation finished"
            ),
            Err(e) => warn!(survey_id = %stored.id, error = %e, "background generation failed"),
        }
    });
}

async fn plan_for(
    db: &PgPool,
    stored: &StoredSurvey,
    ctx: &UserContext,
    preferred: Option<Uuid>,
) -> Result<Option<PlanRow>, ApiError> {
    if let Some(id) = preferred {
        if let Some(row) = repo::find_by_id(db, PlanKind::Meal, id).await? {
            if row.survey_id == stored.id && row.status() != Some(PlanStatus::Archived) {
                return Ok(Some(row));
            }
        }
    }
    Ok(repo::find_current(db, PlanKind::Meal, stored.id, ctx.week_of).await?)
}

/// Discovery, menus and selection only. Results land on the week's current
/// plan, or on a new partial plan when there is none.
pub async fn generate_restaurants(
    state: &AppState,
    stored: &StoredSurvey,
    meal_plan_id: Option<Uuid>,
) -> Result<GenerateResponse, ApiError> {
    let ctx = stored.context();
    let stages = match run_restaurant_stages(&state.pipeline(), &ctx).await? {
        PipelineOutcome::Complete(stages) => stages,
        PipelineOutcome::Empty { stage, message } => {
            return Ok(GenerateResponse::nothing(Some(stage), message))
        }
    };
    let message = stages.home_only.then(|| HOME_ONLY_MESSAGE.to_string());

    let row = match plan_for(&state.db, stored, &ctx, meal_plan_id).await? {
        Some(row) => {
            let mut data = decode(&row);
            data.restaurants = stages.restaurants;
            data.selected_items = (!stages.home_only).then_some(stages.selected);
            data.home_only = stages.home_only;
            data.performance = Some(stages.performance);
            let status = row.status().unwrap_or(PlanStatus::Partial);
            repo::update(&state.db, PlanKind::Meal, row.id, status, &encode(&data)?).await?
        }
        None => {
            info!(survey_id = %stored.id, "no plan for this week; creating a partial one");
            let data = MealPlanData {
                restaurants: stages.restaurants,
                selected_items: (!stages.home_only).then_some(stages.selected),
                meal_plan: None,
                performance: Some(stages.performance),
                home_only: stages.home_only,
                grocery_list: None,
            };
            repo::replace_current(
                &state.db,
                PlanKind::Meal,
                &NewPlan {
                    survey_id: stored.id,
                    user_id: stored.user_id.clone(),
                    week_of: ctx.week_of,
                    status: PlanStatus::Partial,
                    regeneration_count: 0,
                    user_context: context_json(&ctx)?,
                    plan_data: encode(&data)?,
                },
            )
            .await?
        }
    };
    let data = decode(&row);
    Ok(stored_response(&row, data, message))
}

pub fn preview_from(stored: &StoredSurvey, data: Option<MealPlanData>) -> PlanningPreview {
    let Some(data) = data.filter(|d| !d.restaurants.is_empty() || d.home_only) else {
        return PlanningPreview {
            success: true,
            status: "generating",
            message: Some(STILL_GENERATING_MESSAGE.to_string()),
            restaurants: Vec::new(),
            explanations: Vec::new(),
            home_only: false,
            targets: stored.targets(),
            weekly_budget_cents: stored.weekly_budget_cents(),
        };
    };

    let restaurants = data
        .restaurants
        .iter()
        .take(PREVIEW_RESTAURANTS)
        .map(|r| PreviewRestaurant {
            name: r.name.clone(),
            address: r.address.clone(),
            cuisine: r.cuisine.clone(),
            rating: r.rating,
            ordering_url: r.ordering_url.clone(),
        })
        .collect();
    let explanations = data
        .selected_items
        .as_ref()
        .map(|selected| {
            MealType::ALL
                .into_iter()
                .flat_map(|meal| {
                    selected.for_meal(meal).iter().map(move |item| Explanation {
                        meal_type: meal,
                        item_title: item.item_title.clone(),
                        restaurant: item.restaurant.clone(),
                        reasoning: item.reasoning.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    PlanningPreview {
        success: true,
        status: "ready",
        message: data.home_only.then(|| HOME_ONLY_MESSAGE.to_string()),
        restaurants,
        explanations,
        home_only: data.home_only,
        targets: stored.targets(),
        weekly_budget_cents: stored.weekly_budget_cents(),
    }
}

pub async fn planning_preview(
    state: &AppState,
    stored: &StoredSurvey,
    meal_plan_id: Option<Uuid>,
) -> Result<PlanningPreview, ApiError> {
    let ctx = stored.context();
    let row = plan_for(&state.db, stored, &ctx, meal_plan_id).await?;
    Ok(preview_from(stored, row.as_ref().map(decode)))
}

pub fn status_view(row: Option<&PlanRow>) -> PlanStatusView {
    match row {
        Some(row) => PlanStatusView {
            exists: true,
            status: Some(row.status.clone()),
            regeneration_count: row.regeneration_count,
            remaining_regenerations: remaining_regenerations(row.regeneration_count),
            week_of: Some(row.week_of),
            meal_plan_id: Some(row.id),
        },
        None => PlanStatusView {
            exists: false,
            status: None,
            regeneration_count: 0,
            remaining_regenerations: remaining_regenerations(0),
            week_of: None,
            meal_plan_id: None,
        },
    }
}

pub async fn plan_status(
    state: &AppState,
    stored: Option<&StoredSurvey>,
) -> Result<PlanStatusView, ApiError> {
    let Some(stored) = stored else {
        return Ok(status_view(None));
    };
    let ctx = stored.context();
    let row = repo::find_current(&state.db, PlanKind::Meal, stored.id, ctx.week_of).await?;
    Ok(status_view(row.as_ref()))
}

pub async fn current_plan(state: &AppState, stored: &StoredSurvey) -> Result<PlanRow, ApiError> {
    let ctx = stored.context();
    if let Some(row) = repo::find_current(&state.db, PlanKind::Meal, stored.id, ctx.week_of).await? {
        return Ok(row);
    }
    repo::find_latest(&state.db, PlanKind::Meal, stored.id)
        .await?
        .ok_or_else(no_meal_plan)
}

fn no_meal_plan() -> ApiError {
    ApiError::NotFound("No meal plan found".into())
}

/// Plan the user is working on, with its meals; restaurant-only rows have
/// nothing to select from or shop for yet.
async fn plan_with_meals(
    state: &AppState,
    stored: &StoredSurvey,
    preferred: Option<Uuid>,
) -> Result<(PlanRow, MealPlanData), ApiError> {
    let ctx = stored.context();
    let row = plan_for(&state.db, stored, &ctx, preferred)
        .await?
        .ok_or_else(no_meal_plan)?;
    let data = decode(&row);
    if data.meal_plan.is_none() {
        return Err(ApiError::NotFound("Meal plan has no meals yet".into()));
    }
    Ok((row, data))
}

async fn save(state: &AppState, row: &PlanRow, data: &MealPlanData) -> Result<PlanRow, ApiError> {
    let status = row.status().unwrap_or(PlanStatus::Partial);
    Ok(repo::update(&state.db, PlanKind::Meal, row.id, status, &encode(data)?).await?)
}

/// Marks `option_number` as the pick for one meal. The option must exist in
/// that meal.
pub fn select_option(
    data: &mut MealPlanData,
    day: Weekday,
    meal_type: MealType,
    option_number: u32,
) -> Result<(), ApiError> {
    let meal = data
        .meal_plan
        .as_mut()
        .and_then(|plan| plan.weekly_meal_plan.get_mut(&day))
        .map(|day_plan| day_plan.meal_mut(meal_type))
        .filter(|meal| !meal.options.is_empty())
        .ok_or_else(|| ApiError::NotFound("Meal not found".into()))?;
    if !meal
        .options
        .iter()
        .any(|o| o.option_number == Some(option_number))
    {
        return Err(ApiError::Validation(vec![format!(
            "optionNumber: Invalid meal option {option_number}"
        )]));
    }
    meal.selected_option = Some(option_number);
    Ok(())
}

pub async fn select_meal(
    state: &AppState,
    stored: &StoredSurvey,
    meal_plan_id: Option<Uuid>,
    req: &SelectRequest,
) -> Result<SelectResponse, ApiError> {
    let (day, meal_type, option_number) = match (req.day, req.meal_type, req.option_number) {
        (Some(day), Some(meal_type), Some(n)) => (day, meal_type, n),
        (day, meal_type, n) => {
            let missing = [
                day.is_none().then_some("day: required"),
                meal_type.is_none().then_some("mealType: required"),
                n.is_none().then_some("optionNumber: required"),
            ];
            return Err(ApiError::Validation(
                missing.into_iter().flatten().map(String::from).collect(),
            ));
        }
    };

    let (row, mut data) = plan_with_meals(state, stored, req.meal_plan_id.or(meal_plan_id)).await?;
    select_option(&mut data, day, meal_type, option_number)?;
    let row = save(state, &row, &data).await?;
    info!(plan_id = %row.id, day = day.as_str(), meal = meal_type.as_str(), option_number, "meal option selected");
    Ok(SelectResponse {
        success: true,
        message: "Meal selection saved",
        meal_plan_id: row.id,
        day,
        meal_type,
        option_number,
    })
}

/// Builds the week's shopping list from the home options and keeps it on the
/// plan.
pub async fn generate_groceries(
    state: &AppState,
    stored: &StoredSurvey,
    meal_plan_id: Option<Uuid>,
) -> Result<GroceryResponse, ApiError> {
    let (row, mut data) = plan_with_meals(state, stored, meal_plan_id).await?;
    let list = data
        .meal_plan
        .as_ref()
        .map(build_grocery_list)
        .unwrap_or_default();
    data.grocery_list = Some(list.clone());
    let row = save(state, &row, &data).await?;
    info!(plan_id = %row.id, items = list.total_items, "grocery list stored");
    Ok(GroceryResponse {
        success: true,
        meal_plan_id: row.id,
        item_count: list.total_items,
        grocery_list: list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::types::{
            DayPlan, Meal, MealOption, Restaurant, SelectedItem, SelectedItems, WeeklyMealPlan,
        },
        survey::validate::tests::minimal_survey,
    };

    fn stored() -> StoredSurvey {
        let now = time::OffsetDateTime::now_utc();
        StoredSurvey {
            id: Uuid::new_v4(),
            user_id: None,
            survey: minimal_survey(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn preview_falls_back_while_generating() {
        let preview = preview_from(&stored(), None);
        assert_eq!(preview.status, "generating");
        assert_eq!(preview.message.as_deref(), Some(STILL_GENERATING_MESSAGE));
        assert!(preview.restaurants.is_empty());

        let empty = preview_from(&stored(), Some(MealPlanData::default()));
        assert_eq!(empty.status, "generating");
    }

    #[test]
    fn preview_lists_restaurants_and_reasons() {
        let data = MealPlanData {
            restaurants: vec![Restaurant {
                place_id: "p1".into(),
                name: "Sweetgreen".into(),
                rating: Some(4.6),
                ..Default::default()
            }],
            selected_items: Some(SelectedItems {
                lunch: vec![SelectedItem {
                    item_id: Some(4),
                    item_title: "Harvest Bowl".into(),
                    restaurant: "Sweetgreen".into(),
                    reasoning: Some("High protein, fits lunch calories".into()),
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let preview = preview_from(&stored(), Some(data));
        assert_eq!(preview.status, "ready");
        assert_eq!(preview.restaurants[0].name, "Sweetgreen");
        assert_eq!(preview.explanations.len(), 1);
        assert_eq!(preview.explanations[0].meal_type, MealType::Lunch);
    }

    #[test]
    fn status_without_plan() {
        let view = status_view(None);
        assert!(!view.exists);
        assert_eq!(view.remaining_regenerations, 2);
    }

    fn plan_with_lunch() -> MealPlanData {
        let mut plan = WeeklyMealPlan::default();
        plan.weekly_meal_plan.insert(
            Weekday::Tuesday,
            DayPlan {
                lunch: Meal {
                    options: (1..=3)
                        .map(|n| MealOption {
                            option_number: Some(n),
                            dish_name: format!("Bowl {n}"),
                            ..Default::default()
                        })
                        .collect(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        MealPlanData {
            meal_plan: Some(plan),
            ..Default::default()
        }
    }

    #[test]
    fn selecting_an_option_marks_the_meal() {
        let mut data = plan_with_lunch();
        select_option(&mut data, Weekday::Tuesday, MealType::Lunch, 2).unwrap();
        let plan = data.meal_plan.as_ref().unwrap();
        assert_eq!(plan.weekly_meal_plan[&Weekday::Tuesday].lunch.selected_option, Some(2));

        let value = encode(&data).unwrap();
        assert_eq!(value["mealPlan"]["weeklyMealPlan"]["tuesday"]["lunch"]["selectedOption"], 2);
    }

    #[test]
    fn selecting_outside_the_meal_is_rejected() {
        let mut data = plan_with_lunch();
        let err = select_option(&mut data, Weekday::Tuesday, MealType::Lunch, 9).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = select_option(&mut data, Weekday::Tuesday, MealType::Dinner, 1).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = select_option(&mut data, Weekday::Sunday, MealType::Lunch, 1).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = select_option(&mut MealPlanData::default(), Weekday::Tuesday, MealType::Lunch, 1)
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let plan = data.meal_plan.as_ref().unwrap();
        assert_eq!(plan.weekly_meal_plan[&Weekday::Tuesday].lunch.selected_option, None);
    }

    #[test]
    fn plan_data_round_trips_through_json() {
        let data = MealPlanData {
            home_only: true,
            ..Default::default()
        };
        let value = encode(&data).unwrap();
        assert_eq!(value["homeOnly"], true);
        assert!(value.get("mealPlan").is_none());
    }
}
