use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::{
    retry::{with_retry, RetryOutcome, RetryPolicy},
    types::{Restaurant, RestaurantMenu},
    Pipeline, PipelineError,
};
use crate::clients::SearchHit;

const MENU_ITEMS_PER_RESTAURANT: usize = 25;
const SEARCH_RESULTS: usize = 5;
const ORDERING_PATHS: [&str; 3] = [
    "doordash.com/store/",
    "ubereats.com/store/",
    "grubhub.com/restaurant/",
];

/// First hit that points at a delivery platform's store page.
pub fn ordering_link(hits: &[SearchHit]) -> Option<String> {
    hits.iter()
        .find(|hit| {
            let url = hit.url.to_lowercase();
            ORDERING_PATHS.iter().any(|path| url.contains(path))
        })
        .map(|hit| hit.url.clone())
}

async fn find_ordering_url(p: &Pipeline, restaurant: &Restaurant) -> Option<String> {
    let place = restaurant
        .city
        .as_deref()
        .unwrap_or(restaurant.address.as_str());
    let query = format!(
        "{} {} order online doordash ubereats grubhub",
        restaurant.name, place
    );
    let outcome = with_retry(p.policy(RetryPolicy::WEB_SEARCH), "ordering-link", || {
        p.clients.search.search(&query, SEARCH_RESULTS)
    })
    .await;
    match outcome {
        RetryOutcome::Success { data, .. } => ordering_link(&data),
        RetryOutcome::Failure { error, .. } => {
            warn!(restaurant = %restaurant.name, error = %error, "ordering link search failed");
            None
        }
    }
}

async fn fetch_menu(p: &Pipeline, mut restaurant: Restaurant) -> RestaurantMenu {
    let (items, ordering_url) = tokio::join!(
        p.clients
            .menus
            .search_menu_items(&restaurant.name, MENU_ITEMS_PER_RESTAURANT),
        async {
            match &restaurant.ordering_url {
                Some(url) => Some(url.clone()),
                None => find_ordering_url(p, &restaurant).await,
            }
        }
    );
    let items = items.unwrap_or_else(|e| {
        warn!(restaurant = %restaurant.name, error = %e, "menu lookup failed");
        Vec::new()
    });
    debug!(restaurant = %restaurant.name, items = items.len(), "menu fetched");
    restaurant.ordering_url = ordering_url;
    RestaurantMenu { restaurant, items }
}

/// Stage 2. One task per restaurant, all launched at once. Restaurants
/// without menu data are kept so their ordering links still count.
pub async fn fetch_menus(
    p: &Pipeline,
    restaurants: Vec<Restaurant>,
) -> Result<Vec<RestaurantMenu>, PipelineError> {
    let menus = join_all(restaurants.into_iter().map(|r| fetch_menu(p, r))).await;
    let items: usize = menus.iter().map(|m| m.items.len()).sum();
    info!(stage = "menus", restaurants = menus.len(), items, "menus fetched");
    Ok(menus)
}

pub fn usable_items(menus: &[RestaurantMenu]) -> usize {
    menus.iter().map(|m| m.items.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            url: url.into(),
            title: String::new(),
            content: String::new(),
        }
    }

    #[test]
    fn picks_first_store_page() {
        let hits = vec![
            hit("https://www.yelp.com/biz/sweetgreen"),
            hit("https://www.ubereats.com/store/sweetgreen-soma/abc"),
            hit("https://www.doordash.com/store/sweetgreen-123"),
        ];
        assert_eq!(
            ordering_link(&hits).as_deref(),
            Some("https://www.ubereats.com/store/sweetgreen-soma/abc")
        );
        assert_eq!(ordering_link(&[hit("https://doordash.com/")]), None);
    }
}
