use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
    cache::{normalize_key, Cache, CacheTable, MENU_TTL},
    http_error, read_json, ClientError, MenuApi,
};
use crate::pipeline::types::{lenient, MenuItem, VerifiedNutrition};

const SERVICE: &str = "spoonacular";
const BASE_URL: &str = "https://api.spoonacular.com";
const SEARCH_PAGE: usize = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    menu_items: Vec<RawMenuItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMenuItem {
    id: i64,
    title: String,
    #[serde(default)]
    restaurant_chain: String,
    #[serde(default)]
    nutrition: Option<RawNutrition>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNutrition {
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    calories: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    protein: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    carbs: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    fat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    fiber: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    sodium: Option<f64>,
    #[serde(default)]
    nutrients: Vec<Nutrient>,
}

#[derive(Debug, Deserialize)]
struct Nutrient {
    name: String,
    amount: f64,
}

impl RawNutrition {
    fn value(&self, direct: Option<f64>, name: &str) -> Option<f64> {
        direct.or_else(|| {
            self.nutrients
                .iter()
                .find(|n| n.name.eq_ignore_ascii_case(name))
                .map(|n| n.amount)
        })
    }

    fn calories(&self) -> Option<f64> {
        self.value(self.calories, "Calories")
    }

    fn into_verified(self) -> Option<VerifiedNutrition> {
        let calories = self.calories()?;
        Some(VerifiedNutrition {
            calories,
            protein: self.value(self.protein, "Protein").unwrap_or(0.0),
            carbs: self.value(self.carbs, "Carbohydrates").unwrap_or(0.0),
            fat: self.value(self.fat, "Fat").unwrap_or(0.0),
            fiber: self.value(self.fiber, "Fiber"),
            sodium: self.value(self.sodium, "Sodium"),
        })
    }
}

impl From<RawMenuItem> for MenuItem {
    fn from(raw: RawMenuItem) -> Self {
        let nutrition = raw.nutrition.unwrap_or_default();
        MenuItem {
            id: raw.id,
            title: raw.title,
            restaurant_chain: raw.restaurant_chain,
            calories: nutrition.calories(),
            protein: nutrition.value(nutrition.protein, "Protein"),
            carbs: nutrition.value(nutrition.carbs, "Carbohydrates"),
            fat: nutrition.value(nutrition.fat, "Fat"),
        }
    }
}

/// Exact match, or containment either way when both names are longer than
/// three characters.
pub fn matches_chain(item_chain: &str, wanted: &str) -> bool {
    let item = item_chain.trim().to_lowercase();
    let wanted = wanted.trim().to_lowercase();
    if item.is_empty() || wanted.is_empty() {
        return false;
    }
    if item == wanted {
        return true;
    }
    item.chars().count() > 3
        && wanted.chars().count() > 3
        && (item.contains(&wanted) || wanted.contains(&item))
}

pub struct Spoonacular {
    http: reqwest::Client,
    api_key: String,
    cache: Cache,
}

impl Spoonacular {
    pub fn new(http: reqwest::Client, api_key: String, cache: Cache) -> Self {
        Self {
            http,
            api_key,
            cache,
        }
    }
}

#[async_trait]
impl MenuApi for Spoonacular {
    async fn search_menu_items(&self, chain: &str, limit: usize) -> Result<Vec<MenuItem>, ClientError> {
        if self.api_key.is_empty() {
            return Ok(Vec::new());
        }
        let key = normalize_key(chain);
        if let Some(hit) = self.cache.get::<Vec<MenuItem>>(CacheTable::Menus, &key).await {
            return Ok(hit.into_iter().take(limit).collect());
        }

        let number = SEARCH_PAGE.to_string();
        let response = self
            .http
            .get(format!("{BASE_URL}/food/menuItems/search"))
            .query(&[
                ("query", chain),
                ("number", number.as_str()),
                ("addMenuItemInformation", "true"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let parsed: SearchResponse = read_json(SERVICE, response).await?;

        let items: Vec<MenuItem> = parsed
            .menu_items
            .into_iter()
            .filter(|raw| matches_chain(&raw.restaurant_chain, chain))
            .map(MenuItem::from)
            .collect();
        debug!(chain, matched = items.len(), "menu search done");

        self.cache.put(CacheTable::Menus, &key, &items, Some(MENU_TTL)).await;
        Ok(items.into_iter().take(limit).collect())
    }

    async fn menu_item_nutrition(&self, item_id: i64) -> Result<Option<VerifiedNutrition>, ClientError> {
        if self.api_key.is_empty() {
            return Ok(None);
        }
        let response = self
            .http
            .get(format!("{BASE_URL}/food/menuItems/{item_id}"))
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let parsed: RawMenuItem = read_json(SERVICE, response).await?;
        Ok(parsed.nutrition.and_then(RawNutrition::into_verified))
    }
}
