use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{plan_check::PlanCheck, restrictions::Violation};

/// Number coercion for vendor and model payloads, which mix `12`, `"12g"`,
/// `"300mg"` and `"$8.50"` freely.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn number(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => quantity(s),
            _ => None,
        }
    }

    /// Leading numeric part of a quantity string.
    pub fn quantity(s: &str) -> Option<f64> {
        let trimmed = s.trim().trim_start_matches('$').trim();
        let end = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(trimmed.len());
        trimmed[..end].parse::<f64>().ok().filter(|n| n.is_finite())
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.as_ref().and_then(number))
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(opt_f64(d)?.filter(|n| *n >= 0.0).map(|n| n.round() as u32))
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(opt_f64(d)?.map(|n| n as i64))
    }

    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(match v {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|i| match i {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
            _ => Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub price_level: Option<u8>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub business_status: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub ordering_url: Option<String>,
}

impl Restaurant {
    /// Copies every field this record is missing from `other`.
    pub fn fill_missing_from(&mut self, other: &Restaurant) {
        fn fill<T: Clone>(slot: &mut Option<T>, from: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(from);
            }
        }
        if self.address.is_empty() {
            self.address.clone_from(&other.address);
        }
        fill(&mut self.city, &other.city);
        fill(&mut self.zip_code, &other.zip_code);
        fill(&mut self.rating, &other.rating);
        fill(&mut self.price_level, &other.price_level);
        fill(&mut self.cuisine, &other.cuisine);
        fill(&mut self.business_status, &other.business_status);
        fill(&mut self.website, &other.website);
        fill(&mut self.ordering_url, &other.ordering_url);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub restaurant_chain: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub calories: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub protein: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub carbs: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub fat: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantMenu {
    pub restaurant: Restaurant,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedItem {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub item_title: String,
    #[serde(default)]
    pub restaurant: String,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectedItems {
    #[serde(default)]
    pub breakfast: Vec<SelectedItem>,
    #[serde(default)]
    pub lunch: Vec<SelectedItem>,
    #[serde(default)]
    pub dinner: Vec<SelectedItem>,
}

impl SelectedItems {
    pub fn for_meal(&self, meal: MealType) -> &[SelectedItem] {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
        }
    }

    pub fn total(&self) -> usize {
        self.breakfast.len() + self.lunch.len() + self.dinner.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Verified,
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedNutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(default)]
    pub fiber: Option<f64>,
    #[serde(default)]
    pub sodium: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedItem {
    #[serde(flatten)]
    pub item: SelectedItem,
    pub meal_type: MealType,
    pub nutrition: Option<VerifiedNutrition>,
    pub data_source: DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    Restaurant,
    Home,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealOption {
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub option_number: Option<u32>,
    #[serde(default)]
    pub option_type: OptionType,
    #[serde(default)]
    pub dish_name: String,
    #[serde(default)]
    pub restaurant_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub price_cents: Option<u32>,
    #[serde(default)]
    pub price_estimate: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub calories: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub protein: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub carbs: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub fat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub instructions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub cooking_minutes: Option<u32>,
    #[serde(default)]
    pub ordering_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub verified_nutrition: Option<VerifiedNutrition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    #[serde(default)]
    pub options: Vec<MealOption>,
    /// `optionNumber` the user picked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayPlan {
    #[serde(default)]
    pub breakfast: Meal,
    #[serde(default)]
    pub lunch: Meal,
    #[serde(default)]
    pub dinner: Meal,
}

impl DayPlan {
    pub fn meal(&self, meal: MealType) -> &Meal {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
        }
    }

    pub fn meal_mut(&mut self, meal: MealType) -> &mut Meal {
        match meal {
            MealType::Breakfast => &mut self.breakfast,
            MealType::Lunch => &mut self.lunch,
            MealType::Dinner => &mut self.dinner,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeRecipe {
    #[serde(default)]
    pub recipe_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub instructions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub cooking_minutes: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub calories: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub protein: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub carbs: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub fat: Option<f64>,
    /// Cents.
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub estimated_cost: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeRecipes {
    #[serde(default)]
    pub breakfast: Vec<HomeRecipe>,
    #[serde(default)]
    pub lunch: Vec<HomeRecipe>,
    #[serde(default)]
    pub dinner: Vec<HomeRecipe>,
}

impl HomeRecipes {
    pub fn for_meal(&self, meal: MealType) -> &[HomeRecipe] {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
        }
    }

    pub fn total(&self) -> usize {
        self.breakfast.len() + self.lunch.len() + self.dinner.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeRecipeBatch {
    #[serde(default)]
    pub home_recipes: HomeRecipes,
    #[serde(default)]
    pub recipe_summary: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    pub total_days: usize,
    pub total_meals: usize,
    pub total_options: usize,
    pub restaurant_options: usize,
    pub home_options: usize,
    pub empty_meals: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyMealPlan {
    pub weekly_meal_plan: BTreeMap<Weekday, DayPlan>,
    pub week_summary: WeekSummary,
    #[serde(default)]
    pub home_recipe_summary: Value,
    #[serde(default)]
    pub restriction_violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<PlanCheck>,
}

impl WeeklyMealPlan {
    pub fn options_mut(&mut self) -> impl Iterator<Item = &mut MealOption> {
        self.weekly_meal_plan.values_mut().flat_map(|day| {
            [&mut day.breakfast, &mut day.lunch, &mut day.dinner]
                .into_iter()
                .flat_map(|meal| meal.options.iter_mut())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantities_coerce_unit_strings() {
        assert_eq!(lenient::quantity("12g"), Some(12.0));
        assert_eq!(lenient::quantity("300mg"), Some(300.0));
        assert_eq!(lenient::quantity("$8.50"), Some(8.5));
        assert_eq!(lenient::quantity("n/a"), None);
    }

    #[test]
    fn meal_option_tolerates_model_output() {
        let option: MealOption = serde_json::from_value(json!({
            "optionNumber": "1",
            "optionType": "restaurant",
            "dishName": "Grilled Chicken Bowl",
            "calories": "540 kcal",
            "protein": 42,
            "ingredients": "chicken",
            "priceCents": 1299.4
        }))
        .unwrap();
        assert_eq!(option.option_number, Some(1));
        assert_eq!(option.calories, Some(540.0));
        assert_eq!(option.protein, Some(42.0));
        assert_eq!(option.ingredients, vec!["chicken".to_string()]);
        assert_eq!(option.price_cents, Some(1299));
    }

    #[test]
    fn weekly_plan_serializes_days_in_order() {
        let mut plan = WeeklyMealPlan::default();
        plan.weekly_meal_plan.insert(Weekday::Sunday, DayPlan::default());
        plan.weekly_meal_plan.insert(Weekday::Monday, DayPlan::default());
        let text = serde_json::to_string(&plan).unwrap();
        let monday = text.find("monday").unwrap();
        let sunday = text.find("sunday").unwrap();
        assert!(monday < sunday);
    }

    #[test]
    fn fill_missing_keeps_existing_fields() {
        let mut first = Restaurant {
            place_id: "p1".into(),
            name: "Sweetgreen".into(),
            rating: Some(4.6),
            ..Default::default()
        };
        let later = Restaurant {
            place_id: "p1".into(),
            name: "Sweetgreen Downtown".into(),
            rating: Some(3.9),
            website: Some("https://sweetgreen.com".into()),
            ..Default::default()
        };
        first.fill_missing_from(&later);
        assert_eq!(first.name, "Sweetgreen");
        assert_eq!(first.rating, Some(4.6));
        assert_eq!(first.website.as_deref(), Some("https://sweetgreen.com"));
    }
}
