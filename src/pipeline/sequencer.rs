use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{
    discovery::discover_restaurants,
    fallback::has_online_ordering,
    images::enrich_images,
    menus::{fetch_menus, usable_items},
    merge::merge,
    nutrition::verify_nutrition,
    plan_check, restrictions,
    selection::select_items,
    synthesis::synthesize,
    types::{Restaurant, SelectedItems, WeeklyMealPlan},
    Pipeline, PipelineError,
};
use crate::survey::context::UserContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    Menus,
    Selection,
    Nutrition,
    Synthesis,
    Merge,
    Images,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub stages: Vec<StageTiming>,
    pub total_ms: u64,
}

struct Timings {
    started: Instant,
    lap: Instant,
    perf: Performance,
}

impl Timings {
    fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            lap: now,
            perf: Performance::default(),
        }
    }

    fn record(&mut self, stage: Stage) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.lap).as_millis() as u64;
        info!(?stage, elapsed_ms, "stage finished");
        self.perf.stages.push(StageTiming { stage, elapsed_ms });
        self.lap = now;
    }

    fn finish(mut self) -> Performance {
        self.perf.total_ms = self.started.elapsed().as_millis() as u64;
        self.perf
    }
}

#[derive(Debug)]
pub enum PipelineOutcome<T> {
    Complete(T),
    /// A stage produced nothing usable; later stages did not run.
    Empty { stage: Stage, message: String },
}

impl<T> PipelineOutcome<T> {
    fn empty(stage: Stage, message: &str) -> Self {
        info!(?stage, reason = message, "pipeline stopped early");
        PipelineOutcome::Empty {
            stage,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestaurantStages {
    pub restaurants: Vec<Restaurant>,
    pub selected: SelectedItems,
    /// No restaurant offers online ordering; selection was skipped.
    pub home_only: bool,
    pub performance: Performance,
}

#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub plan: WeeklyMealPlan,
    pub restaurants: Vec<Restaurant>,
    pub selected: SelectedItems,
    pub performance: Performance,
}

pub const NO_RESTAURANTS: &str = "No restaurants found near your location";
pub const NO_MENUS: &str = "No menu data found for nearby restaurants";
pub const NO_SELECTION: &str = "No menu items matched your goals";

/// Restaurants that survived menu retrieval, their selected items, and
/// whether the run fell back to home cooking.
type FirstStages = (Vec<Restaurant>, SelectedItems, bool);

async fn first_stages(
    p: &Pipeline,
    ctx: &UserContext,
    timings: &mut Timings,
    require_ordering: bool,
) -> Result<PipelineOutcome<FirstStages>, PipelineError> {
    let restaurants = discover_restaurants(p, ctx).await?;
    timings.record(Stage::Discovery);
    if restaurants.is_empty() {
        return Ok(PipelineOutcome::empty(Stage::Discovery, NO_RESTAURANTS));
    }

    let menus = fetch_menus(p, restaurants).await?;
    timings.record(Stage::Menus);
    let restaurants: Vec<Restaurant> = menus.iter().map(|m| m.restaurant.clone()).collect();

    if require_ordering && !has_online_ordering(&restaurants) {
        info!("no restaurant offers online ordering; home-cooked only");
        return Ok(PipelineOutcome::Complete((restaurants, SelectedItems::default(), true)));
    }
    if usable_items(&menus) == 0 {
        return Ok(PipelineOutcome::empty(Stage::Menus, NO_MENUS));
    }

    let selected = select_items(p, ctx, &menus).await?;
    timings.record(Stage::Selection);
    if selected.total() == 0 {
        return Ok(PipelineOutcome::empty(Stage::Selection, NO_SELECTION));
    }
    Ok(PipelineOutcome::Complete((restaurants, selected, false)))
}

/// Discovery, menus and selection only. Stops with a home-only result when
/// no restaurant can be ordered from online.
#[instrument(skip_all, fields(survey_id = %ctx.survey_id))]
pub async fn run_restaurant_stages(
    p: &Pipeline,
    ctx: &UserContext,
) -> Result<PipelineOutcome<RestaurantStages>, PipelineError> {
    let mut timings = Timings::start();
    Ok(match first_stages(p, ctx, &mut timings, true).await? {
        PipelineOutcome::Complete((restaurants, selected, home_only)) => {
            PipelineOutcome::Complete(RestaurantStages {
                restaurants,
                selected,
                home_only,
                performance: timings.finish(),
            })
        }
        PipelineOutcome::Empty { stage, message } => PipelineOutcome::Empty { stage, message },
    })
}

/// The full seven-stage run. Any stage error aborts the run.
#[instrument(skip_all, fields(survey_id = %ctx.survey_id))]
pub async fn run_pipeline(
    p: &Pipeline,
    ctx: &UserContext,
) -> Result<PipelineOutcome<GeneratedPlan>, PipelineError> {
    let mut timings = Timings::start();
    let (restaurants, selected) = match first_stages(p, ctx, &mut timings, false).await? {
        PipelineOutcome::Complete((restaurants, selected, _)) => (restaurants, selected),
        PipelineOutcome::Empty { stage, message } => {
            return Ok(PipelineOutcome::Empty { stage, message })
        }
    };

    let verified = verify_nutrition(p, &selected).await?;
    timings.record(Stage::Nutrition);

    let synthesis = synthesize(p, ctx, &verified, &restaurants).await?;
    timings.record(Stage::Synthesis);

    let mut plan = merge(synthesis, &verified);
    restrictions::enforce(&mut plan, &ctx.survey);
    plan.validation = Some(plan_check::check_calories(&plan, &ctx.targets));
    timings.record(Stage::Merge);

    let plan = enrich_images(p, plan).await;
    timings.record(Stage::Images);

    let performance = timings.finish();
    info!(total_ms = performance.total_ms, "pipeline complete");
    Ok(PipelineOutcome::Complete(GeneratedPlan {
        plan,
        restaurants,
        selected,
        performance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clients::{
            fake::{upstream_down, FakeChat, FakeImages, FakeMenus, FakePlaces},
            ChatRequest, Clients,
        },
        config::PipelineConfig,
        pipeline::types::{MenuItem, OptionType, VerifiedNutrition, Weekday},
        survey::validate::tests::minimal_survey,
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn ctx() -> UserContext {
        let mut survey = minimal_survey();
        survey.city = Some("Austin".into());
        survey.zip_code = Some("78701".into());
        survey.preferred_cuisines = vec!["mexican".into()];
        UserContext::new(Uuid::new_v4(), survey, OffsetDateTime::now_utc())
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            day_plan_timeout: Duration::from_secs(5),
            home_recipes_timeout: Duration::from_secs(5),
            retry_delay_override: Some(Duration::ZERO),
        }
    }

    fn chipotle() -> Restaurant {
        Restaurant {
            place_id: "chipotle-1".into(),
            name: "Chipotle".into(),
            address: "801 Congress Ave".into(),
            rating: Some(4.1),
            ordering_url: Some("https://www.doordash.com/store/chipotle-1".into()),
            ..Default::default()
        }
    }

    fn menus() -> FakeMenus {
        let mut menus = FakeMenus::default();
        menus.items.insert(
            "Chipotle".into(),
            vec![
                MenuItem {
                    id: 11,
                    title: "Chicken Burrito Bowl".into(),
                    restaurant_chain: "Chipotle".into(),
                    calories: Some(630.0),
                    protein: Some(42.0),
                    carbs: None,
                    fat: None,
                },
                MenuItem {
                    id: 12,
                    title: "Sofritas Salad".into(),
                    restaurant_chain: "Chipotle".into(),
                    calories: Some(420.0),
                    protein: Some(18.0),
                    carbs: None,
                    fat: None,
                },
            ],
        );
        menus.nutrition.insert(
            11,
            VerifiedNutrition {
                calories: 630.0,
                protein: 42.0,
                carbs: 55.0,
                fat: 24.0,
                fiber: None,
                sodium: None,
            },
        );
        menus
    }

    /// Answers each prompt kind with a canned reply; Friday's day plan fails.
    fn scripted_chat(request: &ChatRequest) -> Result<String, crate::clients::ClientError> {
        let prompt = request.user.as_str();
        if prompt.contains("selectedMenuItems") {
            return Ok(json!({ "selectedMenuItems": {
                "lunch": [{ "itemId": 11, "itemTitle": "Chicken Burrito Bowl", "restaurant": "Chipotle" }],
                "dinner": [{ "itemId": 12, "itemTitle": "Sofritas Salad", "restaurant": "Chipotle" },
                           { "itemTitle": "No id here", "restaurant": "Chipotle" }]
            }})
            .to_string());
        }
        if prompt.contains("homeRecipes") {
            return Ok(format!(
                "```json\n{}\n```",
                json!({
                    "homeRecipes": {
                        "breakfast": [{ "recipeName": "Overnight Oats", "estimatedCost": 250 }],
                        "lunch": [{ "recipeName": "Lentil Soup", "estimatedCost": 300 }],
                        "dinner": [{ "recipeName": "Salmon Rice", "estimatedCost": 650 }]
                    },
                    "recipeSummary": { "totalRecipes": 3 }
                })
            ));
        }
        if prompt.contains("Build friday's") {
            return Err(upstream_down());
        }
        if let Some(day) = Weekday::ALL
            .iter()
            .find(|d| prompt.contains(&format!("Build {}'s", d.as_str())))
        {
            return Ok(json!({ "dailyMealPlan": { day.as_str(): {
                "lunch": { "options": [
                    { "optionType": "restaurant", "dishName": "Chicken Burrito Bowl", "restaurantName": "Chipotle", "calories": 700 }
                ]}
            }}})
            .to_string());
        }
        Ok("{}".into())
    }

    fn pipeline(places: FakePlaces) -> (Pipeline, Arc<FakeChat>) {
        let chat = Arc::new(FakeChat::new(scripted_chat));
        let mut clients = Clients::fake();
        clients.chat = chat.clone();
        clients.places = Arc::new(places);
        clients.menus = Arc::new(menus());
        clients.images = Arc::new(FakeImages {
            url: Some("https://img.example".into()),
            fail: false,
        });
        (Pipeline::new(clients, config()), chat)
    }

    #[tokio::test]
    async fn full_run_on_fakes() {
        let (p, _chat) = pipeline(FakePlaces {
            restaurants: vec![chipotle(), chipotle()],
            fail: false,
        });
        let outcome = run_pipeline(&p, &ctx()).await.unwrap();
        let PipelineOutcome::Complete(generated) = outcome else {
            panic!("expected a complete plan");
        };

        assert_eq!(generated.restaurants.len(), 1, "duplicates removed");
        let plan = &generated.plan;
        assert_eq!(plan.weekly_meal_plan.len(), 7);
        assert_eq!(plan.week_summary.total_meals, 21);

        let monday_lunch = &plan.weekly_meal_plan[&Weekday::Monday].lunch.options;
        assert_eq!(monday_lunch.len(), 2);
        assert_eq!(monday_lunch[0].option_type, OptionType::Restaurant);
        assert_eq!(monday_lunch[0].calories, Some(630.0), "verified nutrition wins");
        assert_eq!(monday_lunch[1].option_type, OptionType::Home);
        assert_eq!(monday_lunch[1].dish_name, "Lentil Soup");
        assert_eq!(
            monday_lunch[0].image_url.as_deref(),
            Some("https://img.example/chicken-burrito-bowl")
        );

        // friday failed: only the home option remains
        let friday_lunch = &plan.weekly_meal_plan[&Weekday::Friday].lunch.options;
        assert_eq!(friday_lunch.len(), 1);
        assert_eq!(friday_lunch[0].option_type, OptionType::Home);

        let stages: Vec<Stage> = generated.performance.stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            [
                Stage::Discovery,
                Stage::Menus,
                Stage::Selection,
                Stage::Nutrition,
                Stage::Synthesis,
                Stage::Merge,
                Stage::Images
            ]
        );
    }

    #[tokio::test]
    async fn vegetarian_run_drops_meat_options() {
        let (p, _chat) = pipeline(FakePlaces {
            restaurants: vec![chipotle()],
            fail: false,
        });
        let mut ctx = ctx();
        ctx.survey.diet_prefs = vec!["vegetarian".into()];
        let PipelineOutcome::Complete(generated) = run_pipeline(&p, &ctx).await.unwrap() else {
            panic!("expected a complete plan");
        };

        let plan = &generated.plan;
        let monday_lunch = &plan.weekly_meal_plan[&Weekday::Monday].lunch.options;
        assert_eq!(monday_lunch.len(), 1);
        assert_eq!(monday_lunch[0].dish_name, "Lentil Soup");
        assert_eq!(monday_lunch[0].option_number, Some(1));
        let count = |term: &str| {
            plan.restriction_violations
                .iter()
                .filter(|v| v.term == term)
                .count()
        };
        assert_eq!(count("chicken"), 6, "every day but friday");
        assert_eq!(count("salmon"), 7);
        assert!(plan.weekly_meal_plan[&Weekday::Monday].dinner.options.is_empty());
        assert!(plan.validation.is_some());
    }

    #[tokio::test]
    async fn no_restaurants_stops_after_discovery() {
        let (p, chat) = pipeline(FakePlaces::default());
        let outcome = run_pipeline(&p, &ctx()).await.unwrap();
        match outcome {
            PipelineOutcome::Empty { stage, message } => {
                assert_eq!(stage, Stage::Discovery);
                assert_eq!(message, NO_RESTAURANTS);
            }
            PipelineOutcome::Complete(_) => panic!("expected early exit"),
        }
        assert_eq!(chat.calls(), 0, "no model calls after an empty discovery");
    }

    #[tokio::test]
    async fn failing_places_search_is_treated_as_empty() {
        let (p, _) = pipeline(FakePlaces {
            restaurants: vec![],
            fail: true,
        });
        let outcome = run_pipeline(&p, &ctx()).await.unwrap();
        assert!(matches!(
            outcome,
            PipelineOutcome::Empty {
                stage: Stage::Discovery,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn restaurant_stages_report_home_only() {
        let mut no_link = chipotle();
        no_link.ordering_url = None;
        let (p, chat) = pipeline(FakePlaces {
            restaurants: vec![no_link],
            fail: false,
        });
        let outcome = run_restaurant_stages(&p, &ctx()).await.unwrap();
        let PipelineOutcome::Complete(stages) = outcome else {
            panic!("expected restaurant stages");
        };
        assert!(stages.home_only);
        assert_eq!(stages.selected.total(), 0);
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn selection_failure_aborts_the_run() {
        let chat = Arc::new(FakeChat::new(|_| Err(upstream_down())));
        let mut clients = Clients::fake();
        clients.chat = chat.clone();
        clients.places = Arc::new(FakePlaces {
            restaurants: vec![chipotle()],
            fail: false,
        });
        clients.menus = Arc::new(menus());
        let p = Pipeline::new(clients, config());

        let err = run_pipeline(&p, &ctx()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Exhausted { attempts: 3, .. }));
        assert_eq!(chat.calls(), 3);
    }
}
