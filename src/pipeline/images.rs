use std::collections::{BTreeSet, HashMap};

use futures_util::future::join_all;
use tracing::{info, warn};

use super::{
    retry::{with_retry, RetryOutcome, RetryPolicy},
    types::WeeklyMealPlan,
    Pipeline,
};
use crate::clients::ImageKind;

async fn lookup(p: &Pipeline, kind: ImageKind, name: String) -> (String, Option<String>) {
    let outcome = with_retry(p.policy(RetryPolicy::IMAGES), "image-search", || {
        p.clients.images.find_image(kind, &name)
    })
    .await;
    let attempts = outcome.attempts();
    let url = match outcome {
        RetryOutcome::Success { data, .. } => data,
        RetryOutcome::Failure { error, .. } => {
            warn!(%name, attempts, error = %error, "image search failed");
            None
        }
    };
    (name, url)
}

/// Looks up every distinct name once, in parallel.
pub async fn find_images(
    p: &Pipeline,
    kind: ImageKind,
    names: BTreeSet<String>,
) -> HashMap<String, String> {
    join_all(names.into_iter().map(|name| lookup(p, kind, name)))
        .await
        .into_iter()
        .filter_map(|(name, url)| url.map(|url| (name, url)))
        .collect()
}

/// Stage 7. Options keep `imageUrl: null` when nothing is found.
pub async fn enrich_images(p: &Pipeline, mut plan: WeeklyMealPlan) -> WeeklyMealPlan {
    let names: BTreeSet<String> = plan
        .options_mut()
        .filter(|o| o.image_url.is_none() && !o.dish_name.trim().is_empty())
        .map(|o| o.dish_name.clone())
        .collect();
    let wanted = names.len();
    let found = find_images(p, ImageKind::Food, names).await;

    for option in plan.options_mut() {
        if option.image_url.is_none() {
            option.image_url = found.get(&option.dish_name).cloned();
        }
    }
    info!(stage = "images", wanted, found = found.len(), "images attached");
    plan
}
