use std::collections::HashMap;

use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    fallback::{apply_ranking, needs_rerank, unranked, RERANK_THRESHOLD},
    prompts,
    retry::{with_retry, RetryOutcome, RetryPolicy},
    types::Restaurant,
    Pipeline, PipelineError,
};
use crate::{
    clients::{places::miles_to_meters, PlaceQuery},
    survey::context::UserContext,
};

const MAX_CUISINE_SEARCHES: usize = 5;
const RESULTS_PER_SEARCH: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ranking {
    #[serde(default)]
    ranked_place_ids: Vec<String>,
}

/// One record per place id. The first occurrence keeps its position and
/// fields; later duplicates only fill fields it left empty.
pub fn dedupe_by_place_id(restaurants: Vec<Restaurant>) -> Vec<Restaurant> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Restaurant> = Vec::with_capacity(restaurants.len());
    for restaurant in restaurants {
        match index.get(&restaurant.place_id) {
            Some(&at) => out[at].fill_missing_from(&restaurant),
            None => {
                index.insert(restaurant.place_id.clone(), out.len());
                out.push(restaurant);
            }
        }
    }
    out
}

/// (keyword, cuisine tag) pairs: one general search plus one per preferred
/// cuisine.
pub fn search_plan(ctx: &UserContext) -> Vec<(String, Option<String>)> {
    let diet = ctx.diet();
    let base = if diet.is_empty() {
        "healthy".to_string()
    } else {
        format!("healthy {diet}")
    };
    let mut plan = vec![(format!("{base} restaurant"), None)];
    for cuisine in ctx
        .survey
        .preferred_cuisines
        .iter()
        .take(MAX_CUISINE_SEARCHES)
    {
        plan.push((format!("{base} {cuisine}"), Some(cuisine.clone())));
    }
    plan
}

async fn search(
    p: &Pipeline,
    location: &str,
    radius_meters: u32,
    keyword: String,
    cuisine: Option<String>,
) -> Vec<Restaurant> {
    let query = PlaceQuery {
        location: location.to_string(),
        keyword,
        radius_meters,
        limit: RESULTS_PER_SEARCH,
    };
    let label = format!("places:{}", query.keyword);
    let outcome = with_retry(p.policy(RetryPolicy::PLACES), &label, || {
        p.clients.places.search_restaurants(&query)
    })
    .await;
    match outcome {
        RetryOutcome::Success { data, .. } => data
            .into_iter()
            .map(|mut r| {
                if r.cuisine.is_none() {
                    r.cuisine.clone_from(&cuisine);
                }
                r
            })
            .collect(),
        RetryOutcome::Failure { error, attempts } => {
            warn!(keyword = %query.keyword, attempts, error = %error, "restaurant search failed");
            Vec::new()
        }
    }
}

async fn rerank(p: &Pipeline, ctx: &UserContext, candidates: Vec<Restaurant>) -> Vec<Restaurant> {
    let request = prompts::rerank(ctx, &candidates, RERANK_THRESHOLD);
    match p.chat_json::<Ranking>(&request, "rerank").await {
        Ok(ranking) => match apply_ranking(&candidates, &ranking.ranked_place_ids) {
            Some(ranked) => ranked,
            None => {
                warn!("re-ranking matched no candidates; using unranked list");
                unranked(candidates)
            }
        },
        Err(e) => {
            warn!(error = %e, "re-ranking failed; using unranked list");
            unranked(candidates)
        }
    }
}

/// Stage 1. Searches run concurrently; a failed search contributes nothing.
pub async fn discover_restaurants(
    p: &Pipeline,
    ctx: &UserContext,
) -> Result<Vec<Restaurant>, PipelineError> {
    let location = ctx.survey.location();
    if location.is_empty() {
        warn!(survey_id = %ctx.survey_id, "survey has no location; skipping discovery");
        return Ok(Vec::new());
    }
    let radius = miles_to_meters(ctx.radius_miles());

    let searches = search_plan(ctx)
        .into_iter()
        .map(|(keyword, cuisine)| search(p, &location, radius, keyword, cuisine));
    let found: Vec<Restaurant> = join_all(searches).await.into_iter().flatten().collect();
    let candidates = dedupe_by_place_id(found);
    info!(stage = "discovery", candidates = candidates.len(), "restaurants found");

    if needs_rerank(candidates.len()) {
        Ok(rerank(p, ctx, candidates).await)
    } else {
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clients::{
            fake::{upstream_down, FakeChat, FakePlaces},
            Clients,
        },
        config::PipelineConfig,
        survey::validate::tests::minimal_survey,
    };
    use std::{sync::Arc, time::Duration};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn located_ctx() -> UserContext {
        let mut survey = minimal_survey();
        survey.zip_code = Some("60614".into());
        UserContext::new(Uuid::nil(), survey, OffsetDateTime::now_utc())
    }

    fn pipeline_with(count: usize, chat: Arc<FakeChat>) -> Pipeline {
        let mut clients = Clients::fake();
        clients.places = Arc::new(FakePlaces {
            restaurants: (0..count).map(|i| place(&format!("p{i}"), &format!("R{i}"))).collect(),
            fail: false,
        });
        clients.chat = chat;
        Pipeline::new(
            clients,
            PipelineConfig {
                retry_delay_override: Some(Duration::ZERO),
                ..Default::default()
            },
        )
    }

    fn ids(restaurants: &[Restaurant]) -> Vec<&str> {
        restaurants.iter().map(|r| r.place_id.as_str()).collect()
    }

    fn place(id: &str, name: &str) -> Restaurant {
        Restaurant {
            place_id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn dedupe_keeps_first_position_and_fills_gaps() {
        let mut later = place("a", "Alpha (dup)");
        later.website = Some("https://alpha.example".into());
        let list = vec![place("a", "Alpha"), place("b", "Beta"), later, place("c", "Gamma")];

        let out = dedupe_by_place_id(list);
        let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Beta", "Gamma"]);
        assert_eq!(out[0].website.as_deref(), Some("https://alpha.example"));
    }

    #[test]
    fn dedupe_output_has_unique_ids() {
        let list: Vec<Restaurant> = (0..30).map(|i| place(&format!("p{}", i % 7), "x")).collect();
        let out = dedupe_by_place_id(list);
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn search_plan_caps_cuisines() {
        let mut survey = minimal_survey();
        survey.diet_prefs = vec!["vegan".into()];
        survey.preferred_cuisines = ["thai", "indian", "mexican", "greek", "japanese", "korean"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let ctx = UserContext::new(Uuid::nil(), survey, OffsetDateTime::now_utc());
        let plan = search_plan(&ctx);
        assert_eq!(plan.len(), 1 + MAX_CUISINE_SEARCHES);
        assert_eq!(plan[0], ("healthy vegan restaurant".to_string(), None));
        assert_eq!(plan[1], ("healthy vegan thai".to_string(), Some("thai".to_string())));
    }

    #[tokio::test]
    async fn eight_candidates_skip_the_model() {
        let chat = Arc::new(FakeChat::new(|_| Ok("{}".to_string())));
        let p = pipeline_with(8, chat.clone());
        let found = discover_restaurants(&p, &located_ctx()).await.unwrap();
        assert_eq!(found.len(), 8);
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn above_threshold_reranks_once() {
        let chat = Arc::new(FakeChat::new(|_| {
            Ok(r#"{"rankedPlaceIds": ["p9", "p3", "nope", "p3", "p0"]}"#.to_string())
        }));
        let p = pipeline_with(10, chat.clone());
        let found = discover_restaurants(&p, &located_ctx()).await.unwrap();
        assert_eq!(ids(&found), ["p9", "p3", "p0"]);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn failed_rerank_keeps_first_eight() {
        let chat = Arc::new(FakeChat::new(|_| Err(upstream_down())));
        let p = pipeline_with(10, chat.clone());
        let found = discover_restaurants(&p, &located_ctx()).await.unwrap();
        assert_eq!(ids(&found), ["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"]);
        assert_eq!(chat.calls(), RetryPolicy::CHAT.max_attempts);
    }

    #[tokio::test]
    async fn unusable_ranking_keeps_first_eight() {
        for reply in ["not json at all", r#"{"rankedPlaceIds": ["x", "y"]}"#] {
            let chat = Arc::new(FakeChat::new(move |_| Ok(reply.to_string())));
            let p = pipeline_with(10, chat);
            let found = discover_restaurants(&p, &located_ctx()).await.unwrap();
            assert_eq!(found.len(), 8, "reply {reply:?}");
            assert_eq!(found[0].place_id, "p0");
            assert_eq!(found[7].place_id, "p7");
        }
    }
}
