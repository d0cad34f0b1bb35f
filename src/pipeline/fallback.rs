//! Degradation rules shared by the stages. Each helper is the fallback for
//! one failure mode; none of them aborts a run.

use super::types::{DataSource, MealType, Restaurant, SelectedItem, VerifiedItem};

/// At or below this many candidates the AI re-ranking call is skipped.
pub const RERANK_THRESHOLD: usize = 8;

pub const HOME_ONLY_MESSAGE: &str =
    "No nearby restaurants offer online ordering, so this week's plan is home-cooked only";
pub const STILL_GENERATING_MESSAGE: &str = "Meal plan is still being generated";

pub fn needs_rerank(candidates: usize) -> bool {
    candidates > RERANK_THRESHOLD
}

/// Used when re-ranking is skipped, fails, or returns nothing usable.
pub fn unranked(mut candidates: Vec<Restaurant>) -> Vec<Restaurant> {
    candidates.truncate(RERANK_THRESHOLD);
    candidates
}

/// Candidates in the order the model ranked them. Unknown and repeated ids
/// are skipped; `None` when no id matched.
pub fn apply_ranking(candidates: &[Restaurant], ranked_ids: &[String]) -> Option<Vec<Restaurant>> {
    let mut picked: Vec<Restaurant> = Vec::new();
    for id in ranked_ids {
        if picked.len() == RERANK_THRESHOLD {
            break;
        }
        if picked.iter().any(|r| &r.place_id == id) {
            continue;
        }
        if let Some(found) = candidates.iter().find(|r| &r.place_id == id) {
            picked.push(found.clone());
        }
    }
    (!picked.is_empty()).then_some(picked)
}

pub fn has_online_ordering(restaurants: &[Restaurant]) -> bool {
    restaurants.iter().any(|r| r.ordering_url.is_some())
}

/// A selected item whose nutrition lookup failed or found nothing.
pub fn unverified(item: SelectedItem, meal_type: MealType) -> VerifiedItem {
    VerifiedItem {
        item,
        meal_type,
        nutrition: None,
        data_source: DataSource::Unavailable,
    }
}
